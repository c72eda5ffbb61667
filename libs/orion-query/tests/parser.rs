#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Condition grammar: operator priority, coercion and nesting.

use orion_query::ast::{CompareOperator, Condition, Leaf, LogicalOperator, Value};
use orion_query::{
    Action, CreateRequirement, EntityDef, FieldSchema, FieldType, QueryError, Schema, parse,
    parse_encoded,
};

fn schema() -> Schema {
    Schema::builder()
        .entity(
            EntityDef::new("item")
                .field(FieldSchema::new("name", FieldType::String).create(CreateRequirement::Required))
                .field(FieldSchema::new("date", FieldType::Int))
                .field(FieldSchema::new("price", FieldType::Float))
                .field(FieldSchema::new("active", FieldType::Boolean))
                .field(FieldSchema::new("a", FieldType::Int))
                .field(FieldSchema::new("b", FieldType::Int))
                .field(FieldSchema::new("c", FieldType::Int))
                .roles(Action::Read, &["guest"]),
        )
        .build()
        .unwrap()
}

fn leaf(field: &str, op: CompareOperator, value: Value) -> Condition {
    Condition::Leaf(Leaf {
        entity: Some("item".to_owned()),
        field: field.to_owned(),
        op,
        value,
    })
}

#[test]
fn empty_string_is_always_true() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse(item, "").unwrap().unwrap();
    assert_eq!(cond, Condition::always_true());
    assert_eq!(cond.bound_value_count(), 0);

    // independent of the entity
    let user = schema.entity("user").unwrap();
    assert_eq!(parse(user, "").unwrap(), Some(Condition::always_true()));
}

#[test]
fn multi_char_operator_wins_over_its_prefix() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse(item, "date<=20170101").unwrap().unwrap();
    assert_eq!(cond, leaf("date", CompareOperator::Le, Value::Int(20_170_101)));

    let cond = parse(item, "date<>3").unwrap().unwrap();
    assert_eq!(cond, leaf("date", CompareOperator::Ne, Value::Int(3)));
}

#[test]
fn values_are_coerced_by_field_type() {
    let schema = schema();
    let item = schema.entity("item").unwrap();

    assert_eq!(
        parse(item, "name~item1").unwrap().unwrap(),
        leaf("name", CompareOperator::Contains, Value::Text("item1".to_owned()))
    );
    assert_eq!(
        parse(item, "id=5").unwrap().unwrap(),
        leaf("id", CompareOperator::Eq, Value::Int(5))
    );
    assert_eq!(
        parse(item, "price>2.5").unwrap().unwrap(),
        leaf("price", CompareOperator::Gt, Value::Float(2.5))
    );
    assert_eq!(
        parse(item, "active=true").unwrap().unwrap(),
        leaf("active", CompareOperator::Eq, Value::Int(1))
    );
}

#[test]
fn contains_on_numeric_field_keeps_text() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    assert_eq!(
        parse(item, "date~2017").unwrap().unwrap(),
        leaf("date", CompareOperator::Contains, Value::Text("2017".to_owned()))
    );
}

#[test]
fn null_literal_is_kept_for_any_type() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse(item, "ownerid=NULL").unwrap().unwrap();
    assert_eq!(
        cond,
        leaf("ownerid", CompareOperator::Eq, Value::Text("NULL".to_owned()))
    );
    assert_eq!(cond.bound_value_count(), 0);
}

#[test]
fn bad_numeric_value_is_rejected() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let err = parse(item, "id=abc").unwrap_err();
    assert!(matches!(err, QueryError::InvalidValue { ref field, .. } if field == "id"));
}

#[test]
fn unknown_field_is_rejected() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let err = parse(item, "colour=red").unwrap_err();
    assert_eq!(
        err,
        QueryError::UnknownField {
            entity: "item".to_owned(),
            field: "colour".to_owned()
        }
    );
}

#[test]
fn malformed_comparison_yields_no_condition() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    assert_eq!(parse(item, "justtext").unwrap(), None);
    assert_eq!(parse(item, "=5").unwrap(), None);
}

#[test]
fn and_of_ors() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse(item, "a=1&b=2|c=3").unwrap().unwrap();

    let Condition::Compound { op, children } = &cond else {
        panic!("expected compound, got {cond:?}");
    };
    assert_eq!(*op, LogicalOperator::And);
    assert_eq!(children.len(), 2);
    assert_eq!(children[0], leaf("a", CompareOperator::Eq, Value::Int(1)));
    assert_eq!(
        children[1],
        Condition::or(vec![
            leaf("b", CompareOperator::Eq, Value::Int(2)),
            leaf("c", CompareOperator::Eq, Value::Int(3)),
        ])
    );
    assert_eq!(cond.bound_value_count(), 3);
}

#[test]
fn empty_and_malformed_segments_are_skipped() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse(item, "a=1&&b=2|junk").unwrap().unwrap();
    assert_eq!(
        cond,
        Condition::and(vec![
            leaf("a", CompareOperator::Eq, Value::Int(1)),
            leaf("b", CompareOperator::Eq, Value::Int(2)),
        ])
    );
}

#[test]
fn get_value_searches_nested_nodes() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse(item, "a=1&b=2|ownerid=9").unwrap().unwrap();
    assert_eq!(cond.get_value("ownerid"), Some(&Value::Int(9)));
    assert_eq!(cond.get_value("name"), None);
}

#[test]
fn encoded_input_is_decoded_first() {
    let schema = schema();
    let item = schema.entity("item").unwrap();
    let cond = parse_encoded(item, "date%3C%3D5%26name~x%20y").unwrap().unwrap();
    assert_eq!(
        cond,
        Condition::and(vec![
            leaf("date", CompareOperator::Le, Value::Int(5)),
            leaf("name", CompareOperator::Contains, Value::Text("x y".to_owned())),
        ])
    );
}
