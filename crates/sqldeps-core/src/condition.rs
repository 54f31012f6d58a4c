//! Literal filter conditions
//!
//! A `LiteralCondition` records one literal-valued predicate gating a column,
//! e.g. `o.status IN ('open', 'held')` or `SUBSTR(o.code, 1, 3) = 'ABC'`.

use serde::{Deserialize, Serialize};

/// A literal operand value
///
/// Numeric literal text becomes `Integer` or `Float` depending on the presence
/// of a decimal point. Strings, and date/time literals (kept as their SQL
/// text, e.g. `DATE '2024-01-01'`), are `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LiteralValue {
    /// Convert numeric literal text, keeping the raw text when it does not parse
    pub fn from_numeric_text(text: &str) -> Self {
        let parsed = if text.contains('.') {
            text.parse::<f64>().ok().map(Self::Float)
        } else {
            text.parse::<i64>().ok().map(Self::Integer)
        };

        parsed.unwrap_or_else(|| Self::Text(text.to_string()))
    }

    /// Negate a numeric value (`-5`); text is prefixed with `-`
    pub fn negated(self) -> Self {
        match self {
            Self::Integer(i) => Self::Integer(-i),
            Self::Float(f) => Self::Float(-f),
            Self::Text(t) => Self::Text(format!("-{}", t)),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for LiteralValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(t) => write!(f, "{}", t),
        }
    }
}

/// Filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "not like")]
    NotLike,
    #[serde(rename = "between")]
    Between,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::Between => "between",
        }
    }

    /// Operator seen from the other operand (`5 < col` is `col > 5`)
    pub fn flipped(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            other => other,
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionOperand {
    /// `BETWEEN low AND high`
    Range { low: LiteralValue, high: LiteralValue },

    /// `IN (...)` / `NOT IN (...)`; `value_fns` has one slot per value
    List {
        values: Vec<LiteralValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_fns: Option<Vec<Option<String>>>,
    },

    /// Any single-valued comparison or pattern
    Single { value: LiteralValue },
}

/// One literal predicate on a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralCondition {
    pub op: FilterOp,

    #[serde(flatten)]
    pub operand: ConditionOperand,

    /// Outermost function wrapping the column (`UPPER(col) = ...`)
    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    /// Positional numeric arguments of the column-side wrapper (`SUBSTR(col, 1, 3)`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fn_args: Option<Vec<LiteralValue>>,

    /// Function wrapping a single literal value (`col = UPPER('x')`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fn: Option<String>,
}

impl LiteralCondition {
    /// Single-valued condition
    pub fn single(op: FilterOp, value: LiteralValue) -> Self {
        Self::with_operand(op, ConditionOperand::Single { value })
    }

    /// IN / NOT IN list; `value_fns` is dropped when no value is wrapped
    pub fn list(op: FilterOp, values: Vec<LiteralValue>, value_fns: Vec<Option<String>>) -> Self {
        let value_fns = if value_fns.iter().any(Option::is_some) {
            Some(value_fns)
        } else {
            None
        };

        Self::with_operand(op, ConditionOperand::List { values, value_fns })
    }

    /// BETWEEN range
    pub fn between(low: LiteralValue, high: LiteralValue) -> Self {
        Self::with_operand(FilterOp::Between, ConditionOperand::Range { low, high })
    }

    fn with_operand(op: FilterOp, operand: ConditionOperand) -> Self {
        Self {
            op,
            operand,
            function: None,
            fn_args: None,
            value_fn: None,
        }
    }

    /// Set the column-side wrapping function
    pub fn with_function(mut self, function: Option<String>, fn_args: Option<Vec<LiteralValue>>) -> Self {
        self.function = function;
        self.fn_args = fn_args;
        self
    }

    /// Set the value-side wrapping function
    pub fn with_value_fn(mut self, value_fn: Option<String>) -> Self {
        self.value_fn = value_fn;
        self
    }

    /// The single value, if this is a single-valued condition
    pub fn value(&self) -> Option<&LiteralValue> {
        match &self.operand {
            ConditionOperand::Single { value } => Some(value),
            _ => None,
        }
    }

    /// Key-sorted JSON text used to order condition lists deterministically
    pub fn canonical_key(&self) -> String {
        serde_json::to_value(self)
            .map(|value| value.to_string())
            .unwrap_or_default()
    }
}
