//! Rendering of operation graphs as DML scripts.
//!
//! A graph is walked depth-first from its root. Every node is emitted once,
//! after its inputs, and gets a variable `V0`, `V1`, ... in emission order.
//! Source nodes become `read($Vk, ...)` statements whose paths are supplied
//! by the executor as named script arguments; the root is written to `$OUT`.

use crate::error::{OperatorError, Result};
use crate::operator::{NodeInput, NodeSource, OperationNode};
use crate::types::{DataType, ValueType};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Script argument the root result is written to.
pub const OUTPUT_ARGUMENT: &str = "OUT";

/// How a `$Vk` script argument gets its data.
#[derive(Debug, Clone)]
pub enum InputBinding {
    /// Existing file, passed to the engine as-is.
    Path(PathBuf),
    /// In-memory data the executor must write out first.
    Data(DataFrame),
}

/// A `$name` argument the script expects.
#[derive(Debug, Clone)]
pub struct ScriptInput {
    pub name: String,
    pub data_type: DataType,
    pub binding: InputBinding,
}

/// A rendered DML script plus the bindings needed to run it.
#[derive(Debug, Clone)]
pub struct DmlScript {
    lines: Vec<String>,
    inputs: Vec<ScriptInput>,
    output: Option<DataType>,
    output_value_type: Option<ValueType>,
    root_variable: String,
}

impl DmlScript {
    /// Render the graph rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::ContextMismatch`] if the graph mixes nodes
    /// from different contexts.
    pub fn build(root: &OperationNode) -> Result<Self> {
        let mut builder = ScriptBuilder {
            context_id: root.context().id(),
            variables: HashMap::new(),
            lines: Vec::new(),
            inputs: Vec::new(),
        };

        let root_variable = builder.visit(root)?;
        let output_type = root.output_type();

        let output = match output_type {
            DataType::Matrix | DataType::Frame => {
                builder.lines.push(format!(
                    "write({root_variable}, ${OUTPUT_ARGUMENT}, format=\"csv\", header=FALSE);"
                ));
                Some(output_type)
            }
            DataType::Scalar => {
                builder
                    .lines
                    .push(format!("write({root_variable}, ${OUTPUT_ARGUMENT});"));
                Some(output_type)
            }
            DataType::List => None,
        };

        debug!(
            "Built script for node {} ({} lines, {} inputs)",
            root.id(),
            builder.lines.len(),
            builder.inputs.len()
        );

        Ok(Self {
            lines: builder.lines,
            inputs: builder.inputs,
            output,
            output_value_type: root.value_type(),
            root_variable,
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Full script text, one statement per line.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    pub fn inputs(&self) -> &[ScriptInput] {
        &self.inputs
    }

    /// Type written to `$OUT`, or `None` when the result is not written.
    pub fn output(&self) -> Option<DataType> {
        self.output
    }

    /// Value type of a scalar output, when the root node declares one.
    pub fn output_value_type(&self) -> Option<ValueType> {
        self.output_value_type
    }

    pub fn root_variable(&self) -> &str {
        &self.root_variable
    }
}

impl fmt::Display for DmlScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

struct ScriptBuilder {
    context_id: u64,
    variables: HashMap<u64, String>,
    lines: Vec<String>,
    inputs: Vec<ScriptInput>,
}

enum Step<'a> {
    Enter(&'a OperationNode),
    Emit(&'a OperationNode),
}

impl ScriptBuilder {
    /// Emit `root` and everything it depends on, inputs first.
    ///
    /// Uses an explicit stack so graph depth is not bounded by the thread's
    /// stack size.
    fn visit(&mut self, root: &OperationNode) -> Result<String> {
        let mut stack = vec![Step::Enter(root)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(node) => {
                    self.check_context(node)?;
                    if self.variables.contains_key(&node.id()) {
                        continue;
                    }

                    stack.push(Step::Emit(node));
                    // Reversed so inputs are emitted in argument order.
                    let first_input = stack.len();
                    stack.extend(
                        node.unnamed_inputs()
                            .iter()
                            .chain(node.named_inputs().values())
                            .filter_map(NodeInput::as_node)
                            .map(Step::Enter),
                    );
                    stack[first_input..].reverse();
                }
                Step::Emit(node) => {
                    if !self.variables.contains_key(&node.id()) {
                        self.emit(node)?;
                    }
                }
            }
        }

        self.variable(root)
    }

    fn check_context(&self, node: &OperationNode) -> Result<()> {
        let found = node.context().id();
        if found != self.context_id {
            return Err(OperatorError::ContextMismatch {
                node: node.id(),
                expected: self.context_id,
                found,
            });
        }
        Ok(())
    }

    fn emit(&mut self, node: &OperationNode) -> Result<()> {
        let statement = match node.source() {
            Some(NodeSource::Literal(value)) => value.to_dml(),
            Some(NodeSource::File(path)) => {
                self.bind_input(node.output_type(), InputBinding::Path(path.clone()))
            }
            Some(NodeSource::Data(df)) => {
                self.bind_input(node.output_type(), InputBinding::Data(df.clone()))
            }
            None => {
                let mut args = Vec::with_capacity(
                    node.unnamed_inputs().len() + node.named_inputs().len(),
                );
                for input in node.unnamed_inputs() {
                    args.push(self.argument(input)?);
                }
                for (key, input) in node.named_inputs() {
                    args.push(format!("{key}={}", self.argument(input)?));
                }
                format!("{}({})", node.operation(), args.join(", "))
            }
        };

        let variable = format!("V{}", self.variables.len());
        self.lines.push(format!("{variable} = {statement};"));
        self.variables.insert(node.id(), variable);
        Ok(())
    }

    fn variable(&self, node: &OperationNode) -> Result<String> {
        self.variables.get(&node.id()).cloned().ok_or_else(|| {
            OperatorError::Internal(format!("node {} used before it was emitted", node.id()))
        })
    }

    // Source nodes have no inputs, so the next variable is the one they get.
    fn bind_input(&mut self, data_type: DataType, binding: InputBinding) -> String {
        let name = format!("V{}", self.variables.len());
        let expression = read_expression(&name, data_type);
        self.inputs.push(ScriptInput {
            name,
            data_type,
            binding,
        });
        expression
    }

    fn argument(&self, input: &NodeInput) -> Result<String> {
        match input {
            NodeInput::Node(node) => self.variable(node),
            NodeInput::Scalar(value) => Ok(value.to_dml()),
        }
    }
}

fn read_expression(variable: &str, data_type: DataType) -> String {
    if data_type.is_tabular() {
        format!(
            "read(${variable}, data_type=\"{}\", format=\"csv\", header=FALSE)",
            data_type.dml_name()
        )
    } else {
        format!("read(${variable}, data_type=\"{}\")", data_type.dml_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SystemDsContext;
    use pretty_assertions::assert_eq;
    use polars::df;

    #[test]
    fn test_sum_script() {
        let sds = SystemDsContext::new();
        let script = sds.read_matrix("X.csv").sum().script().unwrap();

        assert_eq!(
            script.text(),
            "V0 = read($V0, data_type=\"matrix\", format=\"csv\", header=FALSE);\n\
             V1 = sum(V0);\n\
             write(V1, $OUT);\n"
        );
        assert_eq!(script.output(), Some(DataType::Scalar));
        assert_eq!(script.output_value_type(), Some(ValueType::Fp64));
        assert_eq!(script.root_variable(), "V1");
        assert_eq!(script.inputs().len(), 1);
        assert!(matches!(
            &script.inputs()[0].binding,
            InputBinding::Path(p) if p == &PathBuf::from("X.csv")
        ));
    }

    #[test]
    fn test_shared_node_emitted_once() {
        let sds = SystemDsContext::new();
        let x = sds.read_matrix("X.csv");
        let list = sds.list([&x, &x]);
        let script = list.script().unwrap();

        assert_eq!(
            script.lines(),
            &[
                "V0 = read($V0, data_type=\"matrix\", format=\"csv\", header=FALSE);".to_string(),
                "V1 = list(V0, V0);".to_string(),
            ]
        );
        assert_eq!(script.output(), None);
    }

    #[test]
    fn test_literal_nodes_and_list_sources() {
        let sds = SystemDsContext::new();
        let models = sds.read_list("models");
        let scale = sds.scalar(2.0);
        let list = sds.list(vec![NodeInput::from(&models), NodeInput::from(&scale)]);
        let script = list.script().unwrap();

        assert_eq!(
            script.text(),
            "V0 = read($V0, data_type=\"list\");\n\
             V1 = 2.0;\n\
             V2 = list(V0, V1);\n"
        );
        assert_eq!(script.inputs().len(), 1);
    }

    #[test]
    fn test_variables_do_not_depend_on_node_ids() {
        let sds = SystemDsContext::new();
        // Burn a few ids so node ids and variable numbers diverge.
        let _unused = sds.read_matrix("unused.csv");
        let _unused2 = sds.read_matrix("unused2.csv");

        let script = sds.read_matrix("X.csv").sum().script().unwrap();
        assert_eq!(script.inputs()[0].name, "V0");
        assert_eq!(script.root_variable(), "V1");
    }

    #[test]
    fn test_in_memory_input_binding() {
        let sds = SystemDsContext::new();
        let df = df!("a" => [1.0, 2.0, 3.0]).unwrap();
        let script = sds.matrix_from_dataframe(df).sum().script().unwrap();

        assert!(matches!(
            &script.inputs()[0].binding,
            InputBinding::Data(d) if d.height() == 3
        ));
        assert_eq!(script.inputs()[0].data_type, DataType::Matrix);
    }

    #[test]
    fn test_deep_graph_renders_on_small_stack() {
        let sds = SystemDsContext::new();
        let mut nested = sds.list([&sds.read_matrix("X.csv")]);
        for _ in 0..1_000 {
            nested = sds.list([&nested]);
        }

        let root = nested.clone();
        let line_count = std::thread::Builder::new()
            .stack_size(128 * 1024)
            .spawn(move || root.script().map(|script| script.line_count()))
            .unwrap()
            .join()
            .unwrap()
            .unwrap();

        assert_eq!(line_count, 1_002);
    }

    #[test]
    fn test_context_mismatch() {
        let a = SystemDsContext::new();
        let b = SystemDsContext::new();
        let x = a.read_matrix("X.csv");
        let y = b.read_matrix("Y.csv");
        let list = a.list([&x, &y]);

        let err = list.script().unwrap_err();
        assert!(matches!(
            err,
            OperatorError::ContextMismatch { expected, found, .. }
                if expected == a.id() && found == b.id()
        ));
    }
}
