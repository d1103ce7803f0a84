//! Deferred Operation Handles for SystemDS Builtins
//!
//! A small client library that describes engine computations as lazy
//! operation graphs, renders them as DML scripts and evaluates them through a
//! caller-supplied executor.
//!
//! # Overview
//!
//! - **Deferred handles**: [`Matrix`], [`Frame`], [`List`] and [`Scalar`]
//!   record an operation name and its bound arguments; nothing runs when
//!   they are created
//! - **Builtin bindings**: [`mice_apply`] forwards `X`, `meta`, `threshold`,
//!   `dM` and `betaList` to the engine's `miceApply` builtin
//! - **Script rendering**: [`DmlScript`] turns a graph into a DML script
//! - **Pluggable execution**: any [`Executor`] can materialize a handle;
//!   [`ProcessExecutor`] launches the engine as an external process
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sds_operator::{ExecutorConfig, ProcessExecutor, SystemDsContext, mice_apply};
//!
//! let sds = SystemDsContext::new();
//! let x = sds.read_matrix("data/X.csv");
//! let meta = sds.read_matrix("data/meta.csv");
//! let d_m = sds.read_frame("data/dM.csv");
//! let beta_list = sds.read_list("models/betaList");
//!
//! // Nothing is computed yet
//! let imputed = mice_apply(&x, &meta, 0.8, &d_m, &beta_list);
//! println!("{}", imputed.script()?);
//!
//! // Evaluate with an engine installation
//! let executor = ProcessExecutor::builder()
//!     .config(ExecutorConfig::from_env())
//!     .build()?;
//! let df = imputed.compute(&executor)?.into_dataframe()?;
//! ```
//!
//! # Validation
//!
//! Handles are never validated locally. Shape mismatches, a threshold
//! outside `[0, 1]` or a model list that does not fit the data are reported
//! by the engine when the script runs. The only local failure is an invalid
//! call through [`MiceApplyBuilder`], which names the missing argument.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod operator;
pub mod script;
pub mod types;

// Re-exports for convenient access
pub use config::{ConfigValidationError, ExecutorConfig, ExecutorConfigBuilder};
pub use context::SystemDsContext;
pub use error::{OperatorError, Result as OperatorResult, ResultExt};
pub use executor::{
    CancellationToken, ExecutionReport, Executor, Materialized, ProcessExecutor,
    ProcessExecutorBuilder,
};
pub use operator::algorithm::{
    MICE_APPLY, MICE_APPLY_ARGUMENTS, MiceApply, MiceApplyBuilder, Threshold, mice_apply,
};
pub use operator::{Frame, List, Matrix, NodeInput, NodeSource, OperationNode, Scalar};
pub use script::{DmlScript, InputBinding, ScriptInput};
pub use types::{DataType, ScalarValue, ValueType};
