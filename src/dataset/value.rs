//! Typed cell values
//!
//! Every cell in a dataset is a [`Value`]. Values are hashable and totally
//! ordered so they can live in filter sets and sorted catalogs; floats are
//! compared by a normalised bit pattern (`-0.0 == 0.0`, all NaNs equal).
//!
//! [`Value::render`] is the single display rendering shared by the page view
//! and both export formats, so an export shows the same text the UI showed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Column data type, inferred when a dataset is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int,
    Float,
    Text,
}

/// A single typed cell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
}

impl Value {
    /// Create a text value
    pub fn text(s: impl AsRef<str>) -> Self {
        Value::Text(Arc::from(s.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value for display and export
    ///
    /// Integral floats below 1e10 drop their fractional part, matching how
    /// numbers are shown in the page table.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e10 {
                    format!("{:.0}", f)
                } else {
                    format!("{}", f)
                }
            }
            Value::Text(s) => s.to_string(),
        }
    }

    /// Coerce a raw filter value into the given column type
    ///
    /// Returns `None` when the value cannot be represented in that type; such
    /// a value can never match a cell of the column. `Null` is kept as-is so a
    /// filter can select missing cells.
    pub fn coerce_to(&self, data_type: DataType) -> Option<Value> {
        match (self, data_type) {
            (Value::Null, _) => Some(Value::Null),

            (Value::Bool(b), DataType::Bool) => Some(Value::Bool(*b)),
            (Value::Text(s), DataType::Bool) => parse_bool(s).map(Value::Bool),

            (Value::Int(n), DataType::Int) => Some(Value::Int(*n)),
            (Value::Float(f), DataType::Int) => {
                // i64::MAX as f64 rounds up to 2^63, which is already out of range.
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(Value::Int(*f as i64))
                } else {
                    None
                }
            }
            (Value::Text(s), DataType::Int) => s.trim().parse().ok().map(Value::Int),

            (Value::Int(n), DataType::Float) => Some(Value::Float(*n as f64)),
            (Value::Float(f), DataType::Float) => Some(Value::Float(*f)),
            (Value::Text(s), DataType::Float) => s.trim().parse().ok().map(Value::Float),

            (Value::Text(s), DataType::Text) => Some(Value::Text(s.clone())),
            (other, DataType::Text) => Some(Value::text(other.render())),

            _ => None,
        }
    }

    /// Parse one raw text field as the given type; empty text is `Null`
    pub fn parse_as(raw: &str, data_type: DataType) -> Option<Value> {
        if raw.is_empty() {
            return Some(Value::Null);
        }
        match data_type {
            DataType::Bool => parse_bool(raw).map(Value::Bool),
            DataType::Int => raw.trim().parse().ok().map(Value::Int),
            DataType::Float => raw.trim().parse().ok().map(Value::Float),
            DataType::Text => Some(Value::text(raw)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn normalized_bits(f: f64) -> u64 {
    if f == 0.0 {
        0.0f64.to_bits()
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

fn normalized(f: f64) -> f64 {
    f64::from_bits(normalized_bits(f))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => normalized_bits(*a) == normalized_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => normalized_bits(*f).hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => normalized(*a).total_cmp(&normalized(*b)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Text => "text",
        };
        f.write_str(name)
    }
}
