//! mrun runner
//!
//! Plans the requested targets, then runs every recipe line of every step
//! in order, one process at a time, stopping at the first failure.

use std::fmt;

use mrun_ast::{MrunError, Runfile, Spanned, Target};
use mrun_parser::command_line::split_command;
use mrun_parser::variable_resolver::{Origin, VariableContext, expand};
use tracing::{debug, info};

pub mod launcher;
pub mod planner;
pub mod scope;

pub use launcher::{Invocation, LaunchOutcome, Launcher, SystemLauncher};
pub use planner::{Bindings, Plan, PlanStep, Planner, bound_scope};
pub use scope::build_scope;

/// Shell used when neither the Runfile nor the options name one
pub const DEFAULT_SHELL: &str = "sh";

/// Knobs that change how a plan is executed
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Echo commands without running them
    pub dry_run: bool,
    /// Never echo commands
    pub silent: bool,
    /// Shell for lines that need one, unless the Runfile sets `SHELL`
    pub shell: Option<String>,
}

/// The invocation that stopped a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub target: String,
    pub bindings: Bindings,
    pub filename: String,
    /// Runfile line of the failing recipe line
    pub line: usize,
    pub program: String,
    pub outcome: LaunchOutcome,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = PlanStep {
            target: self.target.clone(),
            bindings: self.bindings.clone(),
        };
        write!(
            f,
            "*** [{}:{}: {}] Error {}",
            self.filename,
            self.line,
            step.label(),
            self.outcome.exit_code()
        )
    }
}

/// Result of a completed or stopped run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Plan steps started
    pub steps: usize,
    /// Processes launched
    pub invocations: usize,
    pub failure: Option<Failure>,
}

impl RunReport {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Process exit status for the whole run
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.failure
            .as_ref()
            .map_or(0, |failure| failure.outcome.exit_code())
    }
}

pub struct Runner<'a, L: Launcher> {
    runfile: &'a Runfile,
    scope: VariableContext,
    options: RunOptions,
    launcher: L,
}

impl<'a, L: Launcher> Runner<'a, L> {
    #[must_use]
    pub fn new(runfile: &'a Runfile, scope: VariableContext, options: RunOptions, launcher: L) -> Self {
        Self {
            runfile,
            scope,
            options,
            launcher,
        }
    }

    /// Resolve goals (the default target when empty) into a plan
    ///
    /// # Errors
    ///
    /// Returns `MrunError` if no target is available or planning fails
    pub fn plan(&self, goals: &[String]) -> Result<Plan, MrunError> {
        let goals = if goals.is_empty() {
            let default = self
                .runfile
                .default_target()
                .ok_or_else(|| MrunError::NoTargets {
                    filename: self.runfile.filename.clone(),
                })?;
            vec![default.to_string()]
        } else {
            goals.to_vec()
        };
        Planner::new(self.runfile, &self.scope).plan(&goals)
    }

    /// Plan and run `goals`
    ///
    /// Launch failures and non-zero exits end up in the report; errors are
    /// reserved for problems with the Runfile itself.
    ///
    /// # Errors
    ///
    /// Returns `MrunError` for planning failures and for recipe lines that
    /// fail to expand or tokenize
    pub fn run(&mut self, goals: &[String]) -> Result<RunReport, MrunError> {
        let plan = self.plan(goals)?;
        let mut report = RunReport::default();

        for step in &plan.steps {
            report.steps += 1;
            if let Some(failure) = self.run_step(step, &mut report)? {
                report.failure = Some(failure);
                break;
            }
        }

        Ok(report)
    }

    fn run_step(
        &mut self,
        step: &PlanStep,
        report: &mut RunReport,
    ) -> Result<Option<Failure>, MrunError> {
        let runfile = self.runfile;
        let Some(target) = runfile.target(&step.target) else {
            return Err(MrunError::UnknownTarget {
                target: step.target.clone(),
            });
        };
        let scope = bound_scope(&self.scope, &step.target, &step.bindings);
        let shell = self.shell(&scope, target)?;
        let env = self.exported_env(&scope, target)?;
        debug!(step = %step.label(), commands = target.node.recipe.len(), "running step");

        for line in &target.node.recipe {
            let locate = |message: String| {
                MrunError::syntax(message, line.span, &runfile.source_map, &runfile.filename)
            };
            let expanded = expand(&line.node.text, &scope)
                .map_err(|err| err.locate(line.span, &runfile.source_map, &runfile.filename))?;
            let command = split_command(&expanded).map_err(|err| locate(err.to_string()))?;

            let invocation = if command.requires_shell {
                Invocation::shell(&shell, expanded)
            } else {
                match Invocation::direct(command.words, expanded) {
                    Some(invocation) => invocation,
                    None => continue,
                }
            }
            .with_env(env.clone());

            if self.options.dry_run {
                self.launcher.echo(&invocation.display);
                continue;
            }
            if !(line.node.silent || runfile.silent || self.options.silent) {
                self.launcher.echo(&invocation.display);
            }

            info!(
                step = %step.label(),
                program = %invocation.program,
                via_shell = invocation.via_shell,
                "launching"
            );
            let outcome = self.launcher.launch(&invocation);
            report.invocations += 1;

            if !outcome.success() {
                info!(step = %step.label(), %outcome, "invocation failed");
                return Ok(Some(Failure {
                    target: step.target.clone(),
                    bindings: step.bindings.clone(),
                    filename: runfile.filename.clone(),
                    line: runfile.position(line.span).line,
                    program: invocation.program,
                    outcome,
                }));
            }
        }

        Ok(None)
    }

    /// `SHELL` from the Runfile or an override, else the configured shell
    fn shell(&self, scope: &VariableContext, target: &Spanned<Target>) -> Result<String, MrunError> {
        match scope.get("SHELL") {
            Some(variable) if variable.origin >= Origin::File => {
                expand("$(SHELL)", scope).map_err(|err| {
                    err.locate(target.span, &self.runfile.source_map, &self.runfile.filename)
                })
            }
            _ => Ok(self
                .options
                .shell
                .clone()
                .unwrap_or_else(|| DEFAULT_SHELL.to_string())),
        }
    }

    fn exported_env(
        &self,
        scope: &VariableContext,
        target: &Spanned<Target>,
    ) -> Result<Vec<(String, String)>, MrunError> {
        let mut env: Vec<(String, String)> = Vec::new();
        for name in self.runfile.exported() {
            if env.iter().any(|(existing, _)| existing == name) {
                continue;
            }
            let value = expand(&format!("$({name})"), scope).map_err(|err| {
                err.locate(target.span, &self.runfile.source_map, &self.runfile.filename)
            })?;
            env.push((name.to_string(), value));
        }
        Ok(env)
    }
}
