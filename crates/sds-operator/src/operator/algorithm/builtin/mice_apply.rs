//! Binding for the `miceApply` builtin.
//!
//! `miceApply` imputes missing values with Multiple Imputation by Chained
//! Equations, reusing per-column models produced by an earlier `mice` run.
//! Missing values are expected to be empty cells in the original CSV. The
//! binding itself does no imputation and no validation: it records the five
//! arguments under the names the engine resolves them by and returns a
//! deferred matrix.
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `X` | Data matrix, recoded for categorical features |
//! | `meta` | Meta matrix; rows hold the mask of the original data, a 0/1 flag per column for missing values, and the distinct-value count per column (1 for continuous, column max for categorical) |
//! | `threshold` | Confidence in `[0, 1]`; a categorical value is only imputed when its predicted probability exceeds it |
//! | `dM` | Meta frame from one-hot encoding the original data |
//! | `betaList` | List of models trained for each column's imputation |

use crate::error::{OperatorError, Result};
use crate::operator::{Frame, List, Matrix, NodeInput, Scalar};
use indexmap::IndexMap;

/// Builtin name the engine dispatches on.
pub const MICE_APPLY: &str = "miceApply";

/// Argument keys, in declaration order.
pub const MICE_APPLY_ARGUMENTS: [&str; 5] = ["X", "meta", "threshold", "dM", "betaList"];

/// Value bound to `threshold`: a literal or a deferred scalar.
///
/// Only numbers and scalar handles convert into it, so a matrix or a string
/// cannot be passed as the threshold:
///
/// ```compile_fail
/// use sds_operator::{SystemDsContext, mice_apply};
///
/// let sds = SystemDsContext::new();
/// let x = sds.read_matrix("X.csv");
/// let meta = sds.read_matrix("meta.csv");
/// let d_m = sds.read_frame("dM.csv");
/// let beta_list = sds.read_list("betaList");
/// let _ = mice_apply(&x, &meta, &x, &d_m, &beta_list);
/// ```
#[derive(Debug, Clone)]
pub enum Threshold {
    Value(f64),
    Deferred(Scalar),
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Self::Value(value)
    }
}

impl From<Scalar> for Threshold {
    fn from(scalar: Scalar) -> Self {
        Self::Deferred(scalar)
    }
}

impl From<&Scalar> for Threshold {
    fn from(scalar: &Scalar) -> Self {
        Self::Deferred(scalar.clone())
    }
}

impl From<Threshold> for NodeInput {
    fn from(threshold: Threshold) -> Self {
        match threshold {
            Threshold::Value(value) => NodeInput::from(value),
            Threshold::Deferred(scalar) => NodeInput::from(scalar),
        }
    }
}

/// Apply trained MICE models to `x`.
///
/// Returns a deferred matrix holding the imputed dataset. `threshold`
/// accepts an `f64` or a [`Scalar`] handle.
///
/// # Example
///
/// ```rust,ignore
/// let imputed = mice_apply(&x, &meta, 0.8, &d_m, &beta_list);
/// assert_eq!(imputed.operation(), "miceApply");
/// ```
pub fn mice_apply(
    x: &Matrix,
    meta: &Matrix,
    threshold: impl Into<Threshold>,
    d_m: &Frame,
    beta_list: &List,
) -> Matrix {
    let params: IndexMap<String, NodeInput> = [
        ("X", NodeInput::from(x)),
        ("meta", NodeInput::from(meta)),
        ("threshold", NodeInput::from(threshold.into())),
        ("dM", NodeInput::from(d_m)),
        ("betaList", NodeInput::from(beta_list)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();

    Matrix::new(x.context(), MICE_APPLY, Vec::new(), params)
}

/// Named-argument entry point for `miceApply`.
///
/// Use this when arguments are collected one by one (e.g. from a CLI or a
/// config file). [`MiceApplyBuilder::build`] rejects a call with a missing
/// argument before any node is created.
pub struct MiceApply;

impl MiceApply {
    pub fn builder() -> MiceApplyBuilder {
        MiceApplyBuilder::default()
    }
}

/// Builder for a `miceApply` call.
#[derive(Debug, Default, Clone)]
pub struct MiceApplyBuilder {
    x: Option<Matrix>,
    meta: Option<Matrix>,
    threshold: Option<Threshold>,
    d_m: Option<Frame>,
    beta_list: Option<List>,
}

impl MiceApplyBuilder {
    /// Set `X`, the data matrix.
    pub fn x(mut self, x: &Matrix) -> Self {
        self.x = Some(x.clone());
        self
    }

    /// Set `meta`, the meta matrix.
    pub fn meta(mut self, meta: &Matrix) -> Self {
        self.meta = Some(meta.clone());
        self
    }

    /// Set `threshold`, the categorical confidence cutoff.
    pub fn threshold(mut self, threshold: impl Into<Threshold>) -> Self {
        self.threshold = Some(threshold.into());
        self
    }

    /// Set `dM`, the one-hot encoding meta frame.
    pub fn d_m(mut self, d_m: &Frame) -> Self {
        self.d_m = Some(d_m.clone());
        self
    }

    /// Set `betaList`, the trained per-column models.
    pub fn beta_list(mut self, beta_list: &List) -> Self {
        self.beta_list = Some(beta_list.clone());
        self
    }

    /// Build the deferred call.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::MissingArgument`] naming the first missing
    /// key in declaration order.
    pub fn build(self) -> Result<Matrix> {
        let x = self.x.ok_or_else(|| missing("X"))?;
        let meta = self.meta.ok_or_else(|| missing("meta"))?;
        let threshold = self.threshold.ok_or_else(|| missing("threshold"))?;
        let d_m = self.d_m.ok_or_else(|| missing("dM"))?;
        let beta_list = self.beta_list.ok_or_else(|| missing("betaList"))?;

        Ok(mice_apply(&x, &meta, threshold, &d_m, &beta_list))
    }
}

fn missing(argument: &'static str) -> OperatorError {
    OperatorError::MissingArgument {
        operation: MICE_APPLY.to_string(),
        argument,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SystemDsContext;
    use crate::types::{DataType, ScalarValue};

    struct Inputs {
        sds: SystemDsContext,
        x: Matrix,
        meta: Matrix,
        d_m: Frame,
        beta_list: List,
    }

    fn inputs() -> Inputs {
        let sds = SystemDsContext::new();
        Inputs {
            x: sds.read_matrix("X.csv"),
            meta: sds.read_matrix("meta.csv"),
            d_m: sds.read_frame("dM.csv"),
            beta_list: sds.read_list("betaList"),
            sds,
        }
    }

    #[test]
    fn test_argument_mapping() {
        let i = inputs();
        let out = mice_apply(&i.x, &i.meta, 0.8, &i.d_m, &i.beta_list);

        assert_eq!(out.operation(), MICE_APPLY);
        assert_eq!(out.node().output_type(), DataType::Matrix);
        assert!(out.unnamed_inputs().is_empty());

        let named = out.named_inputs();
        let keys: Vec<&str> = named.keys().map(String::as_str).collect();
        assert_eq!(keys, MICE_APPLY_ARGUMENTS);
        assert_eq!(named["X"], NodeInput::from(&i.x));
        assert_eq!(named["meta"], NodeInput::from(&i.meta));
        assert_eq!(named["threshold"], NodeInput::Scalar(ScalarValue::Float(0.8)));
        assert_eq!(named["dM"], NodeInput::from(&i.d_m));
        assert_eq!(named["betaList"], NodeInput::from(&i.beta_list));
    }

    #[test]
    fn test_result_uses_context_of_x() {
        let i = inputs();
        let out = mice_apply(&i.x, &i.meta, 0.8, &i.d_m, &i.beta_list);
        assert_eq!(out.context().id(), i.sds.id());
    }

    #[test]
    fn test_threshold_from_scalar_handle() {
        let i = inputs();
        let threshold = i.sds.scalar(0.9);
        let out = mice_apply(&i.x, &i.meta, &threshold, &i.d_m, &i.beta_list);
        assert_eq!(out.named_inputs()["threshold"], NodeInput::from(&threshold));
    }

    #[test]
    fn test_threshold_conversions() {
        let sds = SystemDsContext::new();
        let scalar = sds.scalar(0.6);

        assert!(matches!(Threshold::from(0.4), Threshold::Value(v) if v == 0.4));
        let deferred = Threshold::from(&scalar);
        assert!(matches!(&deferred, Threshold::Deferred(s) if s.id() == scalar.id()));
        assert_eq!(NodeInput::from(deferred), NodeInput::from(&scalar));
        assert_eq!(
            NodeInput::from(Threshold::from(0.4)),
            NodeInput::Scalar(ScalarValue::Float(0.4))
        );
    }

    #[test]
    fn test_builder_matches_function() {
        let i = inputs();
        let out = MiceApply::builder()
            .beta_list(&i.beta_list)
            .d_m(&i.d_m)
            .threshold(0.5)
            .meta(&i.meta)
            .x(&i.x)
            .build()
            .unwrap();

        let keys: Vec<&str> = out.named_inputs().keys().map(String::as_str).collect();
        assert_eq!(keys, MICE_APPLY_ARGUMENTS);
        assert_eq!(out.named_inputs()["X"], NodeInput::from(&i.x));
    }

    #[test]
    fn test_builder_missing_argument_creates_no_node() {
        let i = inputs();
        let before = i.sds.node_count();

        let err = MiceApply::builder()
            .x(&i.x)
            .meta(&i.meta)
            .threshold(0.8)
            .beta_list(&i.beta_list)
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            OperatorError::MissingArgument { argument: "dM", .. }
        ));
        assert_eq!(i.sds.node_count(), before);
    }

    #[test]
    fn test_builder_reports_first_missing_argument() {
        let err = MiceApply::builder().threshold(0.8).build().unwrap_err();
        assert!(matches!(
            err,
            OperatorError::MissingArgument { argument: "X", .. }
        ));
    }
}
