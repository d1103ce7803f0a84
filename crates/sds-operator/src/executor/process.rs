//! Executor that runs scripts through an external engine process.
//!
//! Each execution gets its own working directory holding the script, the
//! in-memory inputs written as CSV, the engine's stdout/stderr and the
//! output file. The engine is launched as
//!
//! ```text
//! <command> <extra_args...> -f script.dml -nvargs V0=<path> ... OUT=<path>
//! ```
//!
//! and polled until it exits or the cancellation token fires.

use crate::config::{ConfigValidationError, ExecutorConfig, SYSTEMDS_ROOT_ENV};
use crate::error::{OperatorError, Result, ResultExt};
use crate::executor::{CancellationToken, Executor, Materialized};
use crate::script::{DmlScript, InputBinding, OUTPUT_ARGUMENT};
use crate::types::{DataType, ScalarValue};
use chrono::{DateTime, Utc};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const SCRIPT_FILE: &str = "script.dml";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";
const STDERR_TAIL_LINES: usize = 20;

/// Summary of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    /// Set when the working directory outlives the execution.
    pub working_dir: Option<PathBuf>,
    pub script_lines: usize,
    pub inputs: usize,
}

/// Runs scripts by launching the engine command once per execution.
///
/// Use [`ProcessExecutor::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use sds_operator::{ExecutorConfig, ProcessExecutor};
///
/// let executor = ProcessExecutor::builder()
///     .config(ExecutorConfig::from_env())
///     .build()?;
///
/// let imputed = mice_apply(&x, &meta, 0.8, &d_m, &beta_list)
///     .compute(&executor)?
///     .into_dataframe()?;
/// ```
#[derive(Debug)]
pub struct ProcessExecutor {
    config: ExecutorConfig,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(ProcessExecutor: Send, Sync);

/// Per-execution directory, removed on drop unless kept.
struct WorkDir {
    dir: TempDir,
    keep: bool,
}

impl WorkDir {
    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Release the directory, returning its path when it outlives the run.
    fn finish(self) -> Option<PathBuf> {
        self.keep.then(|| self.dir.keep())
    }
}

impl ProcessExecutor {
    /// Create a new executor builder.
    pub fn builder() -> ProcessExecutorBuilder {
        ProcessExecutorBuilder::default()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `script` and also return a report of the run.
    ///
    /// Every run gets a fresh directory, created under
    /// [`working_dir`](ExecutorConfig::working_dir) when one is configured.
    /// With [`keep_working_dir`](ExecutorConfig::keep_working_dir) set, the
    /// directory is kept whether the run succeeds or fails.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::UnsupportedOutput`] if the script writes no output
    ///   (nothing is launched in that case)
    /// - [`OperatorError::EngineNotFound`] if the command cannot be started
    /// - [`OperatorError::Cancelled`] if the token fires while the engine runs
    /// - [`OperatorError::EngineFailed`] on a non-zero exit status
    /// - [`OperatorError::OutputMissing`] if the engine wrote nothing to `$OUT`
    pub fn execute_with_report(
        &self,
        script: &DmlScript,
    ) -> Result<(Materialized, ExecutionReport)> {
        let output_type = script
            .output()
            .ok_or_else(|| OperatorError::UnsupportedOutput(DataType::List.to_string()))?;

        if self.cancellation_token.is_cancelled() {
            return Err(OperatorError::Cancelled);
        }

        let started_at = Utc::now();
        let start = Instant::now();

        let work_dir = self.create_work_dir()?;
        debug!("Executing script in {}", work_dir.path().display());

        let outcome = self.run_in(work_dir.path(), script, output_type);
        let kept_dir = work_dir.finish();

        let (result, exit_code) = match outcome {
            Ok(done) => done,
            Err(e) => {
                if let Some(dir) = &kept_dir {
                    warn!("Execution failed; working directory kept at {}", dir.display());
                }
                return Err(e);
            }
        };

        let report = ExecutionReport {
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            exit_code,
            working_dir: kept_dir,
            script_lines: script.line_count(),
            inputs: script.inputs().len(),
        };
        info!(
            "Engine finished in {}ms ({} output)",
            report.duration_ms, output_type
        );

        Ok((result, report))
    }

    fn run_in(
        &self,
        dir: &Path,
        script: &DmlScript,
        output_type: DataType,
    ) -> Result<(Materialized, Option<i32>)> {
        let mut nvargs = Vec::with_capacity(script.inputs().len() + 1);
        for input in script.inputs() {
            let path = match &input.binding {
                InputBinding::Path(path) => {
                    std::path::absolute(path).context(format!("Resolving input '{}'", input.name))?
                }
                InputBinding::Data(df) => {
                    let path = dir.join(format!("{}.csv", input.name));
                    self.write_csv(df, &path)
                        .context(format!("Writing input '{}'", input.name))?;
                    path
                }
            };
            nvargs.push(format!("{}={}", input.name, path.display()));
        }

        let output_path = dir.join(match output_type {
            DataType::Scalar => "OUT.txt",
            _ => "OUT.csv",
        });
        nvargs.push(format!("{OUTPUT_ARGUMENT}={}", output_path.display()));

        let script_path = dir.join(SCRIPT_FILE);
        fs::write(&script_path, script.text()).context("Writing script")?;

        let status = self.run_engine(dir, &script_path, &nvargs)?;
        if !status.success() {
            let stderr = stderr_tail(&dir.join(STDERR_FILE));
            warn!("Engine exited with {:?}", status.code());
            return Err(OperatorError::EngineFailed {
                status: status.code(),
                stderr,
            });
        }

        if !output_path.exists() {
            return Err(OperatorError::OutputMissing(output_path));
        }

        let result = match output_type {
            DataType::Matrix => Materialized::Matrix(self.read_csv(&output_path)?),
            DataType::Frame => Materialized::Frame(self.read_csv(&output_path)?),
            DataType::Scalar => {
                let text = fs::read_to_string(&output_path).context("Reading scalar output")?;
                let value = match script.output_value_type() {
                    Some(value_type) => ScalarValue::parse_engine_output_as(&text, value_type),
                    None => ScalarValue::parse_engine_output(&text),
                };
                Materialized::Scalar(value)
            }
            DataType::List => {
                return Err(OperatorError::UnsupportedOutput(output_type.to_string()));
            }
        };

        Ok((result, status.code()))
    }

    fn create_work_dir(&self) -> Result<WorkDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sds-operator-");

        let dir = match &self.config.working_dir {
            Some(parent) => {
                fs::create_dir_all(parent).context("Creating working directory")?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .context("Creating run directory")?;

        Ok(WorkDir {
            dir,
            keep: self.config.keep_working_dir,
        })
    }

    fn run_engine(&self, dir: &Path, script_path: &Path, nvargs: &[String]) -> Result<ExitStatus> {
        let stdout = fs::File::create(dir.join(STDOUT_FILE))?;
        let stderr = fs::File::create(dir.join(STDERR_FILE))?;

        let mut command = Command::new(&self.config.systemds_command);
        command
            .args(&self.config.extra_args)
            .arg("-f")
            .arg(script_path)
            .arg("-nvargs")
            .args(nvargs)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        if let Some(home) = &self.config.systemds_home {
            command.env(SYSTEMDS_ROOT_ENV, home);
        }

        info!(
            "Launching engine: {}",
            self.config.systemds_command.display()
        );
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                OperatorError::EngineNotFound(self.config.systemds_command.clone())
            } else {
                OperatorError::Io(e)
            }
        })?;

        let poll = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            if self.cancellation_token.is_cancelled() {
                warn!("Cancelling engine process {}", child.id());
                if let Err(e) = child.kill() {
                    debug!("Kill failed: {}", e);
                }
                child.wait()?;
                return Err(OperatorError::Cancelled);
            }

            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(poll);
        }
    }

    fn write_csv(&self, df: &DataFrame, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path)?;
        let mut df = df.clone();
        CsvWriter::new(&mut file)
            .include_header(false)
            .with_separator(self.config.csv_separator)
            .finish(&mut df)?;
        Ok(())
    }

    /// Read a header-less CSV output, either a single file or a directory of parts.
    fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        if !path.is_dir() {
            return self.read_csv_file(path);
        }

        let mut parts: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| !n.starts_with('.') && !n.starts_with('_') && !n.ends_with(".mtd"))
            })
            .collect();
        parts.sort();

        let mut parts = parts.into_iter();
        let first = parts
            .next()
            .ok_or_else(|| OperatorError::OutputMissing(path.to_path_buf()))?;
        let mut df = self.read_csv_file(&first)?;
        for part in parts {
            df.vstack_mut(&self.read_csv_file(&part)?)
                .context(format!("Appending {}", part.display()))?;
        }
        Ok(df)
    }

    fn read_csv_file(&self, path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(false)
            .with_parse_options(
                CsvParseOptions::default().with_separator(self.config.csv_separator),
            )
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .context(format!("Reading {}", path.display()))?;
        Ok(df)
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, script: &DmlScript) -> Result<Materialized> {
        self.execute_with_report(script).map(|(result, _)| result)
    }
}

fn stderr_tail(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => {
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
            lines[start..].join("\n")
        }
        Err(e) => format!("<stderr unavailable: {e}>"),
    }
}

/// Builder for [`ProcessExecutor`].
#[derive(Default)]
pub struct ProcessExecutorBuilder {
    config: Option<ExecutorConfig>,
    cancellation_token: Option<CancellationToken>,
}

impl ProcessExecutorBuilder {
    /// Set the executor configuration.
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a cancellation token for stopping a running engine.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the executor.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<ProcessExecutor, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(ProcessExecutor {
            config,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}
