//! Untyped operation nodes.

use crate::context::SystemDsContext;
use crate::types::{DataType, ScalarValue, ValueType};
use indexmap::IndexMap;
use polars::prelude::DataFrame;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a source node's data comes from.
#[derive(Debug, Clone)]
pub enum NodeSource {
    /// File read by the engine.
    File(PathBuf),
    /// In-memory data shipped to the engine by the executor.
    Data(DataFrame),
    /// Literal value inlined into the script.
    Literal(ScalarValue),
}

/// An argument bound to an operation.
#[derive(Debug, Clone)]
pub enum NodeInput {
    Node(OperationNode),
    Scalar(ScalarValue),
}

impl NodeInput {
    pub fn as_node(&self) -> Option<&OperationNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Node(_) => None,
        }
    }
}

/// Nodes compare by identity, scalars by value.
impl PartialEq for NodeInput {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Node(a), Self::Node(b)) => a.ptr_eq(b),
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            _ => false,
        }
    }
}

impl From<ScalarValue> for NodeInput {
    fn from(value: ScalarValue) -> Self {
        Self::Scalar(value)
    }
}

impl From<f64> for NodeInput {
    fn from(value: f64) -> Self {
        Self::Scalar(ScalarValue::Float(value))
    }
}

impl From<i64> for NodeInput {
    fn from(value: i64) -> Self {
        Self::Scalar(ScalarValue::Int(value))
    }
}

impl From<bool> for NodeInput {
    fn from(value: bool) -> Self {
        Self::Scalar(ScalarValue::Bool(value))
    }
}

impl From<&str> for NodeInput {
    fn from(value: &str) -> Self {
        Self::Scalar(ScalarValue::from(value))
    }
}

impl From<OperationNode> for NodeInput {
    fn from(node: OperationNode) -> Self {
        Self::Node(node)
    }
}

impl From<&OperationNode> for NodeInput {
    fn from(node: &OperationNode) -> Self {
        Self::Node(node.clone())
    }
}

/// A deferred operation: a name, its bound arguments and its output type.
///
/// Nodes are immutable and shared through an `Arc`, so cloning a node
/// clones the reference, not the graph. Creating a node never evaluates
/// or validates anything.
#[derive(Clone)]
pub struct OperationNode {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    context: SystemDsContext,
    id: u64,
    operation: String,
    output_type: DataType,
    value_type: Option<ValueType>,
    unnamed: Vec<NodeInput>,
    named: IndexMap<String, NodeInput>,
    source: Option<NodeSource>,
}

static_assertions::assert_impl_all!(OperationNode: Send, Sync);

impl OperationNode {
    /// Create a call node for `operation` with the given arguments.
    pub fn new(
        context: &SystemDsContext,
        operation: impl Into<String>,
        output_type: DataType,
        unnamed: Vec<NodeInput>,
        named: IndexMap<String, NodeInput>,
    ) -> Self {
        Self::call(context, operation.into(), output_type, None, unnamed, named)
    }

    /// Create a call node producing a scalar of a known value type.
    pub fn new_scalar(
        context: &SystemDsContext,
        operation: impl Into<String>,
        value_type: ValueType,
        unnamed: Vec<NodeInput>,
        named: IndexMap<String, NodeInput>,
    ) -> Self {
        Self::call(
            context,
            operation.into(),
            DataType::Scalar,
            Some(value_type),
            unnamed,
            named,
        )
    }

    fn call(
        context: &SystemDsContext,
        operation: String,
        output_type: DataType,
        value_type: Option<ValueType>,
        unnamed: Vec<NodeInput>,
        named: IndexMap<String, NodeInput>,
    ) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                context: context.clone(),
                id: context.next_node_id(),
                operation,
                output_type,
                value_type,
                unnamed,
                named,
                source: None,
            }),
        }
    }

    pub(crate) fn with_source(
        context: &SystemDsContext,
        output_type: DataType,
        source: NodeSource,
    ) -> Self {
        let (operation, value_type) = match &source {
            NodeSource::Literal(value) => ("literal", Some(ValueType::of(value))),
            NodeSource::File(_) | NodeSource::Data(_) => ("read", None),
        };
        Self {
            inner: Arc::new(NodeInner {
                context: context.clone(),
                id: context.next_node_id(),
                operation: operation.to_string(),
                output_type,
                value_type,
                unnamed: Vec::new(),
                named: IndexMap::new(),
                source: Some(source),
            }),
        }
    }

    pub fn context(&self) -> &SystemDsContext {
        &self.inner.context
    }

    /// Id of this node, unique within its context.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn output_type(&self) -> DataType {
        self.inner.output_type
    }

    /// Value type of a scalar result, when known.
    pub fn value_type(&self) -> Option<ValueType> {
        self.inner.value_type
    }

    pub fn unnamed_inputs(&self) -> &[NodeInput] {
        &self.inner.unnamed
    }

    pub fn named_inputs(&self) -> &IndexMap<String, NodeInput> {
        &self.inner.named
    }

    pub fn source(&self) -> Option<&NodeSource> {
        self.inner.source.as_ref()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &OperationNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationNode")
            .field("context", &self.inner.context.id())
            .field("id", &self.inner.id)
            .field("operation", &self.inner.operation)
            .field("output_type", &self.inner.output_type)
            .field("unnamed", &self.inner.unnamed.len())
            .field("named", &self.inner.named.keys().collect::<Vec<_>>())
            .finish()
    }
}
