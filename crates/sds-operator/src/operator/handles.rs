//! Typed handles over [`OperationNode`].
//!
//! Each handle fixes the output type of the node it wraps, so builtins can
//! state in their signatures which kind of value they expect.

use crate::context::SystemDsContext;
use crate::error::Result;
use crate::executor::{Executor, Materialized};
use crate::operator::{NodeInput, OperationNode};
use crate::script::DmlScript;
use crate::types::{DataType, ValueType};
use indexmap::IndexMap;
use tracing::debug;

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $data_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            node: OperationNode,
        }

        static_assertions::assert_impl_all!($name: Send, Sync);

        impl $name {
            /// Create a call node producing this type.
            pub fn new(
                context: &SystemDsContext,
                operation: impl Into<String>,
                unnamed: Vec<NodeInput>,
                named: IndexMap<String, NodeInput>,
            ) -> Self {
                let node = OperationNode::new(context, operation, $data_type, unnamed, named);
                debug!(
                    "Deferred {} node {} ({})",
                    $data_type,
                    node.id(),
                    node.operation()
                );
                Self { node }
            }

            pub(crate) fn from_node(node: OperationNode) -> Self {
                debug_assert_eq!(node.output_type(), $data_type);
                Self { node }
            }

            pub fn node(&self) -> &OperationNode {
                &self.node
            }

            pub fn context(&self) -> &SystemDsContext {
                self.node.context()
            }

            pub fn id(&self) -> u64 {
                self.node.id()
            }

            pub fn operation(&self) -> &str {
                self.node.operation()
            }

            pub fn unnamed_inputs(&self) -> &[NodeInput] {
                self.node.unnamed_inputs()
            }

            pub fn named_inputs(&self) -> &IndexMap<String, NodeInput> {
                self.node.named_inputs()
            }

            /// Render the graph rooted at this handle as a DML script.
            pub fn script(&self) -> Result<DmlScript> {
                DmlScript::build(&self.node)
            }

            /// Evaluate the graph rooted at this handle with `executor`.
            pub fn compute(&self, executor: &dyn Executor) -> Result<Materialized> {
                let script = self.script()?;
                executor.execute(&script)
            }
        }

        impl From<&$name> for NodeInput {
            fn from(handle: &$name) -> Self {
                NodeInput::Node(handle.node.clone())
            }
        }

        impl From<$name> for NodeInput {
            fn from(handle: $name) -> Self {
                NodeInput::Node(handle.node)
            }
        }
    };
}

typed_handle!(
    /// Deferred numeric matrix.
    Matrix => DataType::Matrix
);

typed_handle!(
    /// Deferred frame (heterogeneous, possibly string-valued columns).
    Frame => DataType::Frame
);

typed_handle!(
    /// Deferred engine list, e.g. a list of trained models.
    List => DataType::List
);

typed_handle!(
    /// Deferred scalar.
    Scalar => DataType::Scalar
);

impl Matrix {
    /// Sum of all cells.
    pub fn sum(&self) -> Scalar {
        Scalar::typed(
            self.context(),
            "sum",
            ValueType::Fp64,
            vec![self.into()],
            IndexMap::new(),
        )
    }
}

impl Scalar {
    /// Create a call node whose result has a known value type.
    pub fn typed(
        context: &SystemDsContext,
        operation: impl Into<String>,
        value_type: ValueType,
        unnamed: Vec<NodeInput>,
        named: IndexMap<String, NodeInput>,
    ) -> Self {
        let node = OperationNode::new_scalar(context, operation, value_type, unnamed, named);
        debug!(
            "Deferred {} scalar node {} ({})",
            value_type.dml_name(),
            node.id(),
            node.operation()
        );
        Self { node }
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.node.value_type()
    }
}
