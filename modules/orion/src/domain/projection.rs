//! Shaping database rows into response records.

use orion_query::{EntitySchema, FieldType, Join, Record};
use serde_json::Value;

/// Turn a flat result row into the record returned to callers.
///
/// Joined `<alias>_<field>` columns are folded into a nested object under
/// the alias (or `null` when the join matched nothing), secret fields are
/// dropped, and column values are normalized to their declared field types.
#[must_use]
pub fn project_row(entity: &EntitySchema, joins: &[Join], row: Record) -> Record {
    let mut out = Record::new();
    let mut nested: Vec<(String, Record)> = joins
        .iter()
        .map(|j| (j.target_alias.clone(), Record::new()))
        .collect();

    'columns: for (column, value) in row {
        for (join, (_, target)) in joins.iter().zip(nested.iter_mut()) {
            let prefix = format!("{}_", join.target_alias);
            if let Some(field) = column.strip_prefix(&prefix) {
                if join.target_select_fields.iter().any(|f| f == field) {
                    target.insert(field.to_owned(), value);
                    continue 'columns;
                }
            }
        }
        match entity.field(&column) {
            Some(f) if f.is_secret() => {}
            Some(f) => {
                out.insert(column, normalize(f.kind, value));
            }
            None => {
                out.insert(column, value);
            }
        }
    }

    for (alias, target) in nested {
        let matched = target.get("id").is_some_and(|id| !id.is_null());
        let value = if matched {
            Value::Object(target)
        } else {
            Value::Null
        };
        out.insert(alias, value);
    }
    out
}

fn normalize(kind: FieldType, value: Value) -> Value {
    match (kind, value) {
        (FieldType::Boolean, Value::Number(n)) => Value::Bool(n.as_i64().is_some_and(|i| i != 0)),
        (FieldType::Boolean, Value::String(s)) => match s.as_str() {
            "1" | "true" => Value::Bool(true),
            "0" | "false" => Value::Bool(false),
            _ => Value::String(s),
        },
        (kind, Value::String(s)) if kind.is_integer() => {
            s.trim().parse::<i64>().map_or(Value::String(s), Value::from)
        }
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::String(s), Value::Number),
        (_, other) => other,
    }
}
