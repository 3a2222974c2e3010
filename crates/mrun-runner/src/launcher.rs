//! Process launching
//!
//! The runner talks to the outside world only through [`Launcher`], so
//! tests can record invocations instead of spawning processes.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, ExitStatus};

/// A single external process launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child (exported variables)
    pub env: Vec<(String, String)>,
    /// Passed to a shell as `-c <line>`
    pub via_shell: bool,
    /// Expanded recipe line, as echoed
    pub display: String,
}

impl Invocation {
    /// Spawn `words[0]` with the remaining words as arguments
    #[must_use]
    pub fn direct(words: Vec<String>, display: String) -> Option<Self> {
        let mut words = words.into_iter();
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
            env: Vec::new(),
            via_shell: false,
            display,
        })
    }

    /// Run `line` through `shell -c`
    #[must_use]
    pub fn shell(shell: &str, line: String) -> Self {
        Self {
            program: shell.to_string(),
            args: vec!["-c".to_string(), line.clone()],
            env: Vec::new(),
            via_shell: true,
            display: line,
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

/// How a launch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The process ran and exited with this code
    Exited(i32),
    /// The process was killed by this signal
    Signaled(i32),
    /// The program does not exist on the search path
    NotFound,
    /// The program exists but may not be executed
    PermissionDenied,
    /// Any other operating-system launch failure
    SpawnFailed(String),
}

impl LaunchOutcome {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Status to report to the invoker, following shell conventions
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => 128 + *signal,
            Self::NotFound => 127,
            Self::PermissionDenied => 126,
            Self::SpawnFailed(_) => 1,
        }
    }

    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        Self::SpawnFailed(format!("process ended without an exit code: {status}"))
    }

    #[must_use]
    pub fn from_spawn_error(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::SpawnFailed(error.to_string()),
        }
    }
}

impl fmt::Display for LaunchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with status {code}"),
            Self::Signaled(signal) => write!(f, "killed by signal {signal}"),
            Self::NotFound => write!(f, "command not found"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::SpawnFailed(message) => write!(f, "failed to start: {message}"),
        }
    }
}

/// Seam between the runner and process creation
pub trait Launcher {
    /// Show a command line before it runs
    fn echo(&mut self, line: &str);

    /// Run an invocation to completion
    fn launch(&mut self, invocation: &Invocation) -> LaunchOutcome;
}

/// Spawns real processes that inherit this process's standard streams
#[derive(Debug, Default)]
pub struct SystemLauncher {
    working_dir: Option<PathBuf>,
}

impl SystemLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// `./tool` style programs resolve against the working directory
    fn program_path(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        match &self.working_dir {
            Some(dir) if path.is_relative() && program.contains('/') => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Launcher for SystemLauncher {
    fn echo(&mut self, line: &str) {
        println!("{line}");
    }

    fn launch(&mut self, invocation: &Invocation) -> LaunchOutcome {
        let mut cmd = StdCommand::new(self.program_path(&invocation.program));
        cmd.args(&invocation.args);
        cmd.envs(invocation.env.iter().map(|(name, value)| (name, value)));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        match cmd.status() {
            Ok(status) => LaunchOutcome::from_status(status),
            Err(error) => LaunchOutcome::from_spawn_error(&error),
        }
    }
}
