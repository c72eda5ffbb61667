//! Compact condition grammar.
//!
//! ```text
//! condition  := segment ( '&' segment )*
//! segment    := comparison ( '|' comparison )*
//! comparison := field op value
//! op         := '~' | '<>' | '<=' | '>=' | '<' | '>' | '='
//! ```
//!
//! `&` splits first, then `|` inside each `&` segment, so the result is at most
//! an AND of ORs. Parentheses are not part of the grammar; a condition that
//! needs deeper nesting has to be built programmatically.

use crate::ast::{CompareOperator, Condition, Leaf, Value};
use crate::errors::QueryError;
use crate::schema::{EntitySchema, FieldType};

/// Percent-decode one query-string component.
///
/// # Errors
/// Returns `QueryError::Decode` on invalid UTF-8 after decoding.
pub fn decode_component(raw: &str) -> Result<String, QueryError> {
    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| QueryError::Decode(e.to_string()))
}

/// Decode a URL-encoded condition string, then [`parse`] it.
///
/// # Errors
/// See [`parse`] and [`decode_component`].
pub fn parse_encoded(entity: &EntitySchema, raw: &str) -> Result<Option<Condition>, QueryError> {
    parse(entity, &decode_component(raw)?)
}

/// Parse a condition string against one entity.
///
/// Returns `Ok(None)` for a malformed single comparison (no operator, or an
/// empty side); callers treat that as "no condition". Malformed comparisons
/// inside a compound are dropped from it.
///
/// # Errors
/// Returns `QueryError::UnknownField` for a field outside the entity and
/// `QueryError::InvalidValue` when a value does not coerce to its field type.
pub fn parse(entity: &EntitySchema, raw: &str) -> Result<Option<Condition>, QueryError> {
    if raw.is_empty() {
        return Ok(Some(Condition::always_true()));
    }

    if raw.contains(['&', '|']) {
        let mut and_children = Vec::new();
        for segment in raw.split('&').filter(|s| !s.is_empty()) {
            let mut or_children = Vec::new();
            for part in segment.split('|').filter(|s| !s.is_empty()) {
                if let Some(leaf) = parse_comparison(entity, part)? {
                    or_children.push(leaf);
                }
            }
            if or_children.len() == 1 {
                and_children.extend(or_children);
            } else {
                and_children.push(Condition::or(or_children));
            }
        }
        return Ok(Some(Condition::and(and_children)));
    }

    parse_comparison(entity, raw)
}

fn parse_comparison(entity: &EntitySchema, raw: &str) -> Result<Option<Condition>, QueryError> {
    let Some((op, field, value)) = split_comparison(raw) else {
        tracing::debug!(entity = entity.name(), condition = raw, "ignoring malformed comparison");
        return Ok(None);
    };

    let schema = entity.require_field(field)?;
    let value = coerce(schema.kind, op, field, value)?;

    Ok(Some(Condition::Leaf(Leaf {
        entity: Some(entity.name().to_owned()),
        field: field.to_owned(),
        op,
        value,
    })))
}

/// Split on the first operator found in priority order, not the first
/// operator by position.
fn split_comparison(raw: &str) -> Option<(CompareOperator, &str, &str)> {
    let op = CompareOperator::PARSE_ORDER
        .into_iter()
        .find(|op| raw.contains(op.token()))?;
    let (field, value) = raw.split_once(op.token())?;
    if field.is_empty() || value.is_empty() {
        return None;
    }
    Some((op, field, value))
}

fn coerce(kind: FieldType, op: CompareOperator, field: &str, raw: &str) -> Result<Value, QueryError> {
    let text = || Value::Text(raw.to_owned());
    let invalid = || QueryError::InvalidValue {
        field: field.to_owned(),
        value: raw.to_owned(),
        expected: kind,
    };

    if op == CompareOperator::Contains || raw.eq_ignore_ascii_case("null") {
        return Ok(text());
    }

    match kind {
        k if k.is_integer() => raw.parse::<i64>().map(Value::Int).map_err(|_| invalid()),
        FieldType::Float => raw.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
        FieldType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Int(1)),
            "false" | "0" => Ok(Value::Int(0)),
            _ => Err(invalid()),
        },
        _ => Ok(text()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn split_prefers_multi_char_operators() {
        assert_eq!(
            split_comparison("date<=20170101"),
            Some((CompareOperator::Le, "date", "20170101"))
        );
        assert_eq!(
            split_comparison("a<>b"),
            Some((CompareOperator::Ne, "a", "b"))
        );
        assert_eq!(split_comparison("a>=1"), Some((CompareOperator::Ge, "a", "1")));
    }

    #[test]
    fn split_uses_priority_not_position() {
        // '=' appears first by position, '~' wins by priority
        assert_eq!(
            split_comparison("name~a=b"),
            Some((CompareOperator::Contains, "name", "a=b"))
        );
    }

    #[test]
    fn split_rejects_empty_sides() {
        assert_eq!(split_comparison("=5"), None);
        assert_eq!(split_comparison("id="), None);
        assert_eq!(split_comparison("plain"), None);
    }
}
