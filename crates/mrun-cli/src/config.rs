//! `mrun.toml` configuration with layered resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file looked up in the working directory
pub const CONFIG_FILE: &str = "mrun.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mrun: config file not found: {path}")]
    FileNotFound { path: String },

    #[error("mrun: cannot read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("mrun: invalid config {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("mrun: invalid config value for '{field}': {message}")]
    ValidationFailed { field: String, message: String },
}

/// Resolved configuration.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`MRUN_*`)
/// 3. Project config (`mrun.toml` in the working directory, or `--config`)
/// 4. Compiled defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MrunConfig {
    /// Runfile path, relative to the working directory
    pub file: Option<PathBuf>,
    /// Target used when none is named on the command line
    pub default_target: Option<String>,
    /// Shell for command lines that need one
    pub shell: Option<String>,
    /// Echo command lines before running them. Default: true.
    pub echo: Option<bool>,
    /// `EnvFilter` directives
    pub log: Option<String>,
    /// Variables layered above the Runfile and below `NAME=value`
    pub variables: BTreeMap<String, String>,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub file: Option<PathBuf>,
    pub shell: Option<String>,
    pub silent: bool,
}

impl MrunConfig {
    /// Load configuration for a run in `dir`.
    ///
    /// `explicit` is a `--config` path, which must exist. `env` looks up
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file is unreadable or invalid
    pub fn load<F>(
        dir: &Path,
        explicit: Option<&Path>,
        cli_overrides: Option<&CliOverrides>,
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match explicit {
            Some(path) => {
                let path = dir.join(path);
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Self::from_file(&path)?
            }
            None => {
                let path = dir.join(CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(env);
        if let Some(cli) = cli_overrides {
            config.apply_cli_overrides(cli);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for invalid TOML or unknown keys
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(file) = env("MRUN_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Some(shell) = env("MRUN_SHELL") {
            self.shell = Some(shell);
        }
        if let Some(log) = env("MRUN_LOG") {
            self.log = Some(log);
        }
        if let Some(target) = env("MRUN_DEFAULT_TARGET") {
            self.default_target = Some(target);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(file) = &cli.file {
            self.file = Some(file.clone());
        }
        if let Some(shell) = &cli.shell {
            self.shell = Some(shell.clone());
        }
        if cli.silent {
            self.echo = Some(false);
        }
    }

    /// Validate the configuration values
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(shell) = &self.shell {
            if shell.trim().is_empty() {
                return Err(ConfigError::ValidationFailed {
                    field: "shell".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        if let Some(target) = &self.default_target {
            if target.trim().is_empty() {
                return Err(ConfigError::ValidationFailed {
                    field: "default_target".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        for name in self.variables.keys() {
            if !mrun_parser::string_utils::is_valid_variable_name(name) {
                return Err(ConfigError::ValidationFailed {
                    field: format!("variables.{name}"),
                    message: "not a valid variable name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns whether commands are echoed, defaulting to true
    #[must_use]
    pub fn effective_echo(&self) -> bool {
        self.echo.unwrap_or(true)
    }
}
