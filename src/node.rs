use std::cmp::Ordering;

use serde::Serialize;
use serde_json::{Map, Value};

/// A paginated record. Implementors expose the raw value of any column the
/// set can be ordered by, plus the primary key.
pub trait Node {
    /// Value of `column`, or `Value::Null` when the node has no such column.
    fn field(&self, column: &str) -> Value;
}

impl Node for Value {
    fn field(&self, column: &str) -> Value {
        self.get(column).cloned().unwrap_or(Value::Null)
    }
}

impl Node for Map<String, Value> {
    fn field(&self, column: &str) -> Value {
        self.get(column).cloned().unwrap_or(Value::Null)
    }
}

/// Extracts `column` from any serializable record.
///
/// Serializes the whole record, so prefer a hand-written [`Node`] impl on hot paths.
pub fn field_of<T: Serialize>(node: &T, column: &str) -> Value {
    match serde_json::to_value(node) {
        Ok(value) => value.field(column),
        Err(_) => Value::Null,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Canonical collation of column values: null first, then booleans, numbers,
/// strings (bytewise), arrays and objects.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
        },
        (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
        (Value::Array(a), Value::Array(b)) => {
            for (a, b) in a.iter().zip(b) {
                let ord = compare_values(a, b);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
