//! Deferred operation handles.
//!
//! Every value in a graph is an [`OperationNode`]: an operation name plus the
//! arguments bound to it. Nothing is computed when a node is created; a graph
//! is rendered to a [`DmlScript`](crate::script::DmlScript) and evaluated by an
//! [`Executor`](crate::executor::Executor) only when the caller asks for it.

pub mod algorithm;
mod handles;
mod node;

pub use handles::{Frame, List, Matrix, Scalar};
pub use node::{NodeInput, NodeSource, OperationNode};
