//! Configuration for running scripts through an external engine process.
//!
//! This module provides configuration options using the builder pattern
//! for [`ProcessExecutor`](crate::executor::ProcessExecutor) setup.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Environment variable pointing at an engine installation.
pub const SYSTEMDS_ROOT_ENV: &str = "SYSTEMDS_ROOT";

/// Environment variable overriding the engine command.
pub const SYSTEMDS_COMMAND_ENV: &str = "SYSTEMDS_COMMAND";

/// Configuration for the process executor.
///
/// Use [`ExecutorConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use sds_operator::config::ExecutorConfig;
///
/// let config = ExecutorConfig::builder()
///     .systemds_command("/opt/systemds/bin/systemds")
///     .keep_working_dir(true)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Command used to launch the engine.
    /// Default: "systemds" (resolved through PATH)
    pub systemds_command: PathBuf,

    /// Engine installation directory, exported as `SYSTEMDS_ROOT` to the child.
    /// Default: None
    pub systemds_home: Option<PathBuf>,

    /// Parent of the per-execution directories holding scripts, inputs and
    /// outputs. If None, they are created under the system temp directory.
    /// Default: None
    pub working_dir: Option<PathBuf>,

    /// Whether to keep each execution's directory after the run, including
    /// failed runs.
    /// Default: false
    pub keep_working_dir: bool,

    /// Field separator for CSV written to and read from the engine.
    /// Default: b','
    pub csv_separator: u8,

    /// How often the running engine is checked for exit or cancellation.
    /// Default: 50
    pub poll_interval_ms: u64,

    /// Arguments placed before `-f <script>`, e.g. `["-exec", "singlenode"]`.
    /// Default: empty
    pub extra_args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            systemds_command: PathBuf::from("systemds"),
            systemds_home: None,
            working_dir: None,
            keep_working_dir: false,
            csv_separator: b',',
            poll_interval_ms: 50,
            extra_args: Vec::new(),
        }
    }
}

impl ExecutorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Default configuration adjusted from the environment.
    ///
    /// `SYSTEMDS_ROOT` sets the installation directory and makes the command
    /// `$SYSTEMDS_ROOT/bin/systemds`; `SYSTEMDS_COMMAND` overrides the command.
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(SYSTEMDS_ROOT_ENV) {
            let root = PathBuf::from(root);
            config.systemds_command = root.join("bin").join("systemds");
            config.systemds_home = Some(root);
        }
        if let Some(command) = lookup(SYSTEMDS_COMMAND_ENV) {
            config.systemds_command = PathBuf::from(command);
        }
        config
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.systemds_command.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyCommand);
        }

        if matches!(self.csv_separator, b'"' | b'\n' | b'\r') || !self.csv_separator.is_ascii() {
            return Err(ConfigValidationError::InvalidSeparator(
                self.csv_separator as char,
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidPollInterval(
                self.poll_interval_ms,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Engine command must not be empty")]
    EmptyCommand,

    #[error("Invalid CSV separator: {0:?}")]
    InvalidSeparator(char),

    #[error("Invalid poll interval: {0}ms (must be at least 1)")]
    InvalidPollInterval(u64),
}

/// Builder for [`ExecutorConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    systemds_command: Option<PathBuf>,
    systemds_home: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    keep_working_dir: Option<bool>,
    csv_separator: Option<u8>,
    poll_interval_ms: Option<u64>,
    extra_args: Vec<String>,
}

impl ExecutorConfigBuilder {
    /// Set the command used to launch the engine.
    pub fn systemds_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.systemds_command = Some(command.into());
        self
    }

    /// Set the engine installation directory.
    pub fn systemds_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.systemds_home = Some(home.into());
        self
    }

    /// Create execution directories under `dir` instead of the system temp directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Keep each execution's directory for inspection.
    pub fn keep_working_dir(mut self, keep: bool) -> Self {
        self.keep_working_dir = Some(keep);
        self
    }

    /// Set the CSV field separator.
    pub fn csv_separator(mut self, separator: u8) -> Self {
        self.csv_separator = Some(separator);
        self
    }

    /// Set the poll interval in milliseconds.
    pub fn poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = Some(interval);
        self
    }

    /// Append an argument placed before `-f <script>`.
    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ExecutorConfig` or an error if validation fails.
    pub fn build(self) -> Result<ExecutorConfig, ConfigValidationError> {
        let config = ExecutorConfig {
            systemds_command: self
                .systemds_command
                .unwrap_or_else(|| PathBuf::from("systemds")),
            systemds_home: self.systemds_home,
            working_dir: self.working_dir,
            keep_working_dir: self.keep_working_dir.unwrap_or(false),
            csv_separator: self.csv_separator.unwrap_or(b','),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(50),
            extra_args: self.extra_args,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.systemds_command, PathBuf::from("systemds"));
        assert_eq!(config.csv_separator, b',');
        assert_eq!(config.poll_interval_ms, 50);
        assert!(!config.keep_working_dir);
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ExecutorConfig::builder()
            .systemds_command("/opt/systemds/bin/systemds")
            .systemds_home("/opt/systemds")
            .keep_working_dir(true)
            .csv_separator(b';')
            .poll_interval_ms(10)
            .extra_arg("-exec")
            .extra_arg("singlenode")
            .build()
            .unwrap();

        assert_eq!(
            config.systemds_command,
            PathBuf::from("/opt/systemds/bin/systemds")
        );
        assert_eq!(config.systemds_home, Some(PathBuf::from("/opt/systemds")));
        assert!(config.keep_working_dir);
        assert_eq!(config.csv_separator, b';');
        assert_eq!(config.extra_args, vec!["-exec", "singlenode"]);
    }

    #[test]
    fn test_validation_empty_command() {
        let result = ExecutorConfig::builder().systemds_command("").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyCommand
        ));
    }

    #[test]
    fn test_validation_invalid_separator() {
        let result = ExecutorConfig::builder().csv_separator(b'"').build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidSeparator('"')
        ));
    }

    #[test]
    fn test_validation_invalid_poll_interval() {
        let result = ExecutorConfig::builder().poll_interval_ms(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidPollInterval(0)
        ));
    }

    #[test]
    fn test_from_vars_root_and_command() {
        let root_only = ExecutorConfig::from_vars(|name| {
            (name == SYSTEMDS_ROOT_ENV).then(|| "/opt/systemds".to_string())
        });
        assert_eq!(
            root_only.systemds_command,
            PathBuf::from("/opt/systemds/bin/systemds")
        );
        assert_eq!(root_only.systemds_home, Some(PathBuf::from("/opt/systemds")));

        let both = ExecutorConfig::from_vars(|name| match name {
            SYSTEMDS_ROOT_ENV => Some("/opt/systemds".to_string()),
            SYSTEMDS_COMMAND_ENV => Some("/usr/local/bin/sds".to_string()),
            _ => None,
        });
        assert_eq!(both.systemds_command, PathBuf::from("/usr/local/bin/sds"));
        assert_eq!(both.systemds_home, Some(PathBuf::from("/opt/systemds")));

        let neither = ExecutorConfig::from_vars(|_| None);
        assert_eq!(neither.systemds_command, PathBuf::from("systemds"));
        assert!(neither.systemds_home.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "systemds_command": "sds",
            "systemds_home": null,
            "working_dir": "/tmp/sds-work",
            "keep_working_dir": true,
            "csv_separator": 44,
            "poll_interval_ms": 25,
            "extra_args": ["-stats"]
        }"#;

        let config: ExecutorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.systemds_command, PathBuf::from("sds"));
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp/sds-work")));
        assert_eq!(config.csv_separator, b',');
        assert_eq!(config.extra_args, vec!["-stats"]);
        assert!(config.validate().is_ok());
    }
}
