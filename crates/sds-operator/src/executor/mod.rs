//! Materialization of deferred handles.
//!
//! An [`Executor`] turns a [`DmlScript`] into data. The library never picks
//! one on its own: callers pass an executor to
//! [`Matrix::compute`](crate::operator::Matrix::compute) and friends, which
//! keeps engine access explicit and easy to replace in tests.

mod cancellation;
mod process;

pub use cancellation::CancellationToken;
pub use process::{ExecutionReport, ProcessExecutor, ProcessExecutorBuilder};

use crate::error::{OperatorError, Result};
use crate::script::DmlScript;
use crate::types::ScalarValue;
use polars::prelude::DataFrame;

/// Evaluates rendered scripts.
///
/// Implementations must be `Send + Sync` so one executor can serve handles
/// computed from several threads.
pub trait Executor: Send + Sync {
    /// Run `script` and return the value written to its output.
    fn execute(&self, script: &DmlScript) -> Result<Materialized>;
}

/// A computed result.
#[derive(Debug, Clone)]
pub enum Materialized {
    Matrix(DataFrame),
    Frame(DataFrame),
    Scalar(ScalarValue),
}

impl Materialized {
    /// The tabular result, or `UnsupportedOutput` for scalars.
    pub fn into_dataframe(self) -> Result<DataFrame> {
        match self {
            Self::Matrix(df) | Self::Frame(df) => Ok(df),
            Self::Scalar(_) => Err(OperatorError::UnsupportedOutput(
                "scalar as dataframe".to_string(),
            )),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}
