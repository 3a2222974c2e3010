//! Resolving goals into an ordered list of steps
//!
//! Dependencies are visited depth first in declared order, a matrix target
//! repeats its whole chain once per label, and each (target, bindings) pair
//! is scheduled at most once. Planning finishes before anything runs.

use std::collections::{BTreeMap, HashSet};

use mrun_ast::{MrunError, Runfile, Span, Spanned, Target};
use mrun_parser::variable_resolver::{TARGET_VARIABLE, VariableContext, expand};
use tracing::{debug, warn};

/// Matrix variables fixed for one step, ordered by name
pub type Bindings = BTreeMap<String, String>;

/// One scheduled recipe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub target: String,
    pub bindings: Bindings,
}

/// Steps in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step labels as `target` or `target[VAR=value,...]`
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.steps.iter().map(PlanStep::label).collect()
    }
}

impl PlanStep {
    #[must_use]
    pub fn label(&self) -> String {
        if self.bindings.is_empty() {
            return self.target.clone();
        }
        let bindings: Vec<String> = self
            .bindings
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("{}[{}]", self.target, bindings.join(","))
    }
}

/// Scope for expanding a target's text under `bindings`
#[must_use]
pub fn bound_scope(scope: &VariableContext, target: &str, bindings: &Bindings) -> VariableContext {
    let mut bound = VariableContext::with_parent(scope.clone());
    for (name, value) in bindings {
        bound.bind(name.clone(), value.clone());
    }
    bound.bind(TARGET_VARIABLE, target);
    bound
}

/// Who asked for a target, for error locations
#[derive(Clone, Copy)]
struct Requester<'a> {
    name: &'a str,
    span: Span,
}

pub struct Planner<'a> {
    runfile: &'a Runfile,
    scope: &'a VariableContext,
    steps: Vec<PlanStep>,
    planned: HashSet<(String, Bindings)>,
    /// Targets currently being visited, outermost first
    stack: Vec<String>,
}

impl<'a> Planner<'a> {
    #[must_use]
    pub fn new(runfile: &'a Runfile, scope: &'a VariableContext) -> Self {
        Self {
            runfile,
            scope,
            steps: Vec::new(),
            planned: HashSet::new(),
            stack: Vec::new(),
        }
    }

    /// Plan `goals` in order; later goals reuse steps earlier ones scheduled
    ///
    /// # Errors
    ///
    /// Returns `MrunError` for unknown targets, cycles, and expansion
    /// failures in dependency lists or matrix labels
    pub fn plan(mut self, goals: &[String]) -> Result<Plan, MrunError> {
        for goal in goals {
            self.visit(goal, &Bindings::new(), None)?;
        }
        debug!(steps = self.steps.len(), "plan complete");
        Ok(Plan { steps: self.steps })
    }

    fn visit(
        &mut self,
        name: &str,
        bindings: &Bindings,
        requester: Option<Requester<'_>>,
    ) -> Result<(), MrunError> {
        let runfile = self.runfile;
        let Some(target) = runfile.target(name) else {
            return Err(match requester {
                Some(requester) => MrunError::unknown_dependency(
                    name.to_string(),
                    requester.name.to_string(),
                    requester.span,
                    &runfile.source_map,
                    &runfile.filename,
                ),
                None => MrunError::UnknownTarget {
                    target: name.to_string(),
                },
            });
        };

        if let Some(start) = self.stack.iter().position(|active| active == name) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(MrunError::cycle(
                chain,
                requester.map_or(target.span, |requester| requester.span),
                &runfile.source_map,
                &runfile.filename,
            ));
        }

        self.stack.push(name.to_string());
        match &target.node.matrix {
            Some(matrix) => {
                let scope = bound_scope(self.scope, name, bindings);
                let mut labels = Vec::new();
                for raw in &matrix.labels {
                    let expanded = expand(raw, &scope).map_err(|err| {
                        err.locate(target.span, &runfile.source_map, &runfile.filename)
                    })?;
                    labels.extend(expanded.split_whitespace().map(ToString::to_string));
                }
                if labels.is_empty() {
                    warn!(target_name = name, variable = %matrix.variable, "matrix has no labels");
                }
                for label in labels {
                    let mut bound = bindings.clone();
                    bound.insert(matrix.variable.clone(), label);
                    self.visit_body(target, &bound)?;
                }
            }
            None => self.visit_body(target, bindings)?,
        }
        self.stack.pop();
        Ok(())
    }

    fn visit_body(&mut self, target: &'a Spanned<Target>, bindings: &Bindings) -> Result<(), MrunError> {
        let name = target.node.name.as_str();
        let key = (name.to_string(), bindings.clone());
        if self.planned.contains(&key) {
            debug!(target_name = name, "already planned");
            return Ok(());
        }

        let scope = bound_scope(self.scope, name, bindings);
        let requester = Requester {
            name,
            span: target.span,
        };
        for raw in &target.node.dependencies {
            let expanded = expand(raw, &scope).map_err(|err| {
                err.locate(target.span, &self.runfile.source_map, &self.runfile.filename)
            })?;
            for dependency in expanded.split_whitespace() {
                self.visit(dependency, bindings, Some(requester))?;
            }
        }

        // A dependency shared through a diamond may have scheduled us already
        if self.planned.insert(key) {
            self.steps.push(PlanStep {
                target: name.to_string(),
                bindings: bindings.clone(),
            });
        }
        Ok(())
    }
}
