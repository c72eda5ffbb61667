//! Parameterized statements.

mod builder;
mod condition;

pub use builder::{SelectSpec, SqlBuilder};

use orion_query::ast::Value;

/// A bound parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Map a JSON request value onto a bindable one. Booleans become 0/1;
    /// arrays and objects are stored as their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Int(i64::from(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(SqlValue::Int)
                .or_else(|| n.as_f64().map(SqlValue::Float))
                .unwrap_or_else(|| SqlValue::Text(n.to_string())),
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Int(i) => SqlValue::Int(*i),
            Value::Float(f) => SqlValue::Float(*f),
            Value::Text(s) => SqlValue::Text(s.clone()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_owned())
    }
}

/// Rendered statement plus its parameters in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    /// Parameters keyed the way named-placeholder drivers expect them
    /// (`value0`, `value1`, ...).
    pub fn named_params(&self) -> impl Iterator<Item = (String, &SqlValue)> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("value{i}"), v))
    }
}
