#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Physical column type of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    #[default]
    Long,
    Double,
    Boolean,
    Varchar,
}

impl DataType {
    /// Whether values of this type occupy a fixed number of bytes per row.
    pub fn is_fixed_width(self) -> bool {
        self.fixed_size().is_some()
    }

    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::Int => Some(std::mem::size_of::<i32>()),
            DataType::Long => Some(std::mem::size_of::<i64>()),
            DataType::Double => Some(std::mem::size_of::<f64>()),
            DataType::Boolean => Some(std::mem::size_of::<bool>()),
            DataType::Varchar => None,
        }
    }
}

/// A single scalar as seen through the generic accessors.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(Arc<str>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The block type able to hold this value, `None` for nulls.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(DataType::Int),
            Value::Long(_) => Some(DataType::Long),
            Value::Double(_) => Some(DataType::Double),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::String(_) => Some(DataType::Varchar),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_types() {
        assert!(DataType::Int.is_fixed_width());
        assert!(DataType::Long.is_fixed_width());
        assert!(DataType::Double.is_fixed_width());
        assert!(!DataType::Varchar.is_fixed_width());
        assert_eq!(DataType::Long.fixed_size(), Some(8));
    }

    #[test]
    fn value_reports_its_block_type() {
        assert_eq!(Value::from(1i32).data_type(), Some(DataType::Int));
        assert_eq!(Value::from("a").data_type(), Some(DataType::Varchar));
        assert_eq!(Value::Null.data_type(), None);
        assert_eq!(Value::from("a").to_string(), "'a'");
    }
}
