//! Context that owns node identity for one operation graph.
//!
//! A [`SystemDsContext`] hands out node ids and creates the source nodes a
//! graph starts from (files, in-memory frames, literals, lists). It never
//! talks to the engine itself; evaluation goes through an
//! [`Executor`](crate::executor::Executor) chosen by the caller.

use crate::operator::{Frame, List, Matrix, NodeInput, NodeSource, OperationNode, Scalar};
use crate::types::{DataType, ScalarValue};
use indexmap::IndexMap;
use polars::prelude::DataFrame;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Factory for deferred operation nodes.
///
/// Cloning is cheap and clones share the same id space.
///
/// # Example
///
/// ```rust,ignore
/// use sds_operator::SystemDsContext;
///
/// let sds = SystemDsContext::new();
/// let x = sds.read_matrix("data/X.csv");
/// let total = x.sum();
/// println!("{}", total.script()?);
/// ```
#[derive(Clone)]
pub struct SystemDsContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: u64,
    next_node: AtomicU64,
}

static_assertions::assert_impl_all!(SystemDsContext: Send, Sync);

impl Default for SystemDsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemDsContext {
    pub fn new() -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Created context {}", id);
        Self {
            inner: Arc::new(ContextInner {
                id,
                next_node: AtomicU64::new(0),
            }),
        }
    }

    /// Unique id of this context within the process.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn next_node_id(&self) -> u64 {
        self.inner.next_node.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of nodes created so far.
    pub fn node_count(&self) -> u64 {
        self.inner.next_node.load(Ordering::Relaxed)
    }

    /// A matrix the engine reads from `path` at evaluation time.
    pub fn read_matrix(&self, path: impl Into<PathBuf>) -> Matrix {
        Matrix::from_node(self.source(DataType::Matrix, NodeSource::File(path.into())))
    }

    /// A frame the engine reads from `path` at evaluation time.
    pub fn read_frame(&self, path: impl Into<PathBuf>) -> Frame {
        Frame::from_node(self.source(DataType::Frame, NodeSource::File(path.into())))
    }

    /// A list the engine reads from `path` at evaluation time.
    pub fn read_list(&self, path: impl Into<PathBuf>) -> List {
        List::from_node(self.source(DataType::List, NodeSource::File(path.into())))
    }

    /// Bind an in-memory frame as a numeric matrix input.
    pub fn matrix_from_dataframe(&self, df: DataFrame) -> Matrix {
        Matrix::from_node(self.source(DataType::Matrix, NodeSource::Data(df)))
    }

    /// Bind an in-memory frame as a frame input.
    pub fn frame_from_dataframe(&self, df: DataFrame) -> Frame {
        Frame::from_node(self.source(DataType::Frame, NodeSource::Data(df)))
    }

    /// A literal scalar node.
    pub fn scalar(&self, value: impl Into<ScalarValue>) -> Scalar {
        Scalar::from_node(self.source(DataType::Scalar, NodeSource::Literal(value.into())))
    }

    /// A DML `list(...)` of nodes and scalars, in the given order.
    pub fn list<I, T>(&self, items: I) -> List
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeInput>,
    {
        let items: Vec<NodeInput> = items.into_iter().map(Into::into).collect();
        List::new(self, "list", items, IndexMap::new())
    }

    fn source(&self, output_type: DataType, source: NodeSource) -> OperationNode {
        OperationNode::with_source(self, output_type, source)
    }
}

impl fmt::Debug for SystemDsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemDsContext")
            .field("id", &self.id())
            .field("node_count", &self.node_count())
            .finish()
    }
}
