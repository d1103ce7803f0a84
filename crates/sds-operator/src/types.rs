use serde::{Deserialize, Serialize};
use std::fmt;

/// Output type of an operation as understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Matrix,
    Frame,
    List,
    Scalar,
}

impl DataType {
    /// Name used for `data_type=` arguments in DML.
    pub fn dml_name(&self) -> &'static str {
        match self {
            Self::Matrix => "matrix",
            Self::Frame => "frame",
            Self::List => "list",
            Self::Scalar => "scalar",
        }
    }

    /// Whether the engine can write this type as CSV.
    pub fn is_tabular(&self) -> bool {
        matches!(self, Self::Matrix | Self::Frame)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dml_name())
    }
}

/// Value type of a scalar, used to read engine output back without
/// guessing from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Int64,
    Fp64,
    String,
}

impl ValueType {
    /// Name of the value type in DML.
    pub fn dml_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int64 => "int64",
            Self::Fp64 => "fp64",
            Self::String => "string",
        }
    }

    pub fn of(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Bool(_) => Self::Boolean,
            ScalarValue::Int(_) => Self::Int64,
            ScalarValue::Float(_) => Self::Fp64,
            ScalarValue::Str(_) => Self::String,
        }
    }
}

/// A literal scalar passed to, or returned from, the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "double",
            Self::Str(_) => "string",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Render the value as a DML literal.
    pub fn to_dml(&self) -> String {
        match self {
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => float_literal(*v),
            Self::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        other => out.push(other),
                    }
                }
                out.push('"');
                out
            }
        }
    }

    /// Parse a scalar as written by the engine's `write(scalar, path)`.
    pub fn parse_engine_output(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return Self::Float(v);
        }
        Self::Str(trimmed.to_string())
    }

    /// Parse engine output known to hold a `value_type`.
    ///
    /// The engine prints whole doubles without a fraction, so `6` read as
    /// [`ValueType::Fp64`] is `Float(6.0)`. Text that does not parse as the
    /// expected type falls back to [`parse_engine_output`](Self::parse_engine_output).
    pub fn parse_engine_output_as(text: &str, value_type: ValueType) -> Self {
        let trimmed = text.trim();
        let parsed = match value_type {
            ValueType::Fp64 => trimmed.parse::<f64>().ok().map(Self::Float),
            ValueType::Int64 => trimmed.parse::<i64>().ok().map(Self::Int),
            ValueType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },
            ValueType::String => Some(Self::Str(trimmed.to_string())),
        };
        parsed.unwrap_or_else(|| Self::parse_engine_output(trimmed))
    }
}

// f64's Display drops the fraction for whole numbers; DML would then read an integer.
fn float_literal(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    let s = v.to_string();
    if s.contains('.') { s } else { format!("{s}.0") }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dml())
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_literals_keep_fraction() {
        assert_eq!(ScalarValue::Float(0.8).to_dml(), "0.8");
        assert_eq!(ScalarValue::Float(1.0).to_dml(), "1.0");
        assert_eq!(ScalarValue::Float(-3.0).to_dml(), "-3.0");
        assert_eq!(ScalarValue::Float(f64::NAN).to_dml(), "NaN");
        assert_eq!(ScalarValue::Float(f64::NEG_INFINITY).to_dml(), "-Inf");
    }

    #[test]
    fn test_other_literals() {
        assert_eq!(ScalarValue::Int(7).to_dml(), "7");
        assert_eq!(ScalarValue::Bool(true).to_dml(), "TRUE");
        assert_eq!(ScalarValue::Bool(false).to_dml(), "FALSE");
        assert_eq!(
            ScalarValue::from("a \"quoted\" \\ path").to_dml(),
            r#""a \"quoted\" \\ path""#
        );
    }

    #[test]
    fn test_parse_engine_output() {
        assert_eq!(ScalarValue::parse_engine_output("42\n"), ScalarValue::Int(42));
        assert_eq!(
            ScalarValue::parse_engine_output(" 0.25 "),
            ScalarValue::Float(0.25)
        );
        assert_eq!(
            ScalarValue::parse_engine_output("TRUE"),
            ScalarValue::Bool(true)
        );
        assert_eq!(
            ScalarValue::parse_engine_output("done"),
            ScalarValue::Str("done".to_string())
        );
    }

    #[test]
    fn test_parse_engine_output_with_value_type() {
        assert_eq!(
            ScalarValue::parse_engine_output_as("6\n", ValueType::Fp64),
            ScalarValue::Float(6.0)
        );
        assert_eq!(
            ScalarValue::parse_engine_output_as("6", ValueType::Int64),
            ScalarValue::Int(6)
        );
        assert_eq!(
            ScalarValue::parse_engine_output_as("FALSE", ValueType::Boolean),
            ScalarValue::Bool(false)
        );
        assert_eq!(
            ScalarValue::parse_engine_output_as("42", ValueType::String),
            ScalarValue::Str("42".to_string())
        );
        assert_eq!(
            ScalarValue::parse_engine_output_as("NaN", ValueType::Fp64).as_f64().map(f64::is_nan),
            Some(true)
        );
        // Unparseable text keeps whatever it looks like.
        assert_eq!(
            ScalarValue::parse_engine_output_as("2.5", ValueType::Int64),
            ScalarValue::Float(2.5)
        );
    }

    #[test]
    fn test_value_type_of_literal() {
        assert_eq!(ValueType::of(&ScalarValue::Float(1.0)), ValueType::Fp64);
        assert_eq!(ValueType::of(&ScalarValue::from("a")), ValueType::String);
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::Matrix.dml_name(), "matrix");
        assert_eq!(DataType::List.to_string(), "list");
        assert!(DataType::Frame.is_tabular());
        assert!(!DataType::Scalar.is_tabular());
    }

    #[test]
    fn test_scalar_serialization() {
        let json = serde_json::to_string(&ScalarValue::Float(0.8)).unwrap();
        assert_eq!(json, "0.8");
        let back: ScalarValue = serde_json::from_str("true").unwrap();
        assert_eq!(back, ScalarValue::Bool(true));
    }
}
