use thiserror::Error;

use crate::schema::FieldType;

/// Request-level failures while turning raw parameters into a query shape.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("field '{field}' on entity '{entity}' is not a foreign key")]
    NotForeignKey { entity: String, field: String },

    #[error("invalid value '{value}' for field '{field}': expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: FieldType,
    },

    #[error("unsupported order-by field: {0}")]
    InvalidOrderBy(String),

    #[error("duplicate join alias: {0}")]
    DuplicateJoinAlias(String),

    #[error("malformed percent-encoding: {0}")]
    Decode(String),
}

/// Configuration faults detected while assembling the schema. Fatal at start-up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("entity '{entity}': foreign key '{field}' targets unknown entity '{target}'")]
    UnknownForeignKeyTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("entity '{entity}': join alias '{alias}' is used by more than one foreign key")]
    DuplicateAlias { entity: String, alias: String },

    #[error("entity '{entity}': join alias '{alias}' collides with a field name")]
    AliasCollidesWithField { entity: String, alias: String },

    #[error("invalid entity name '{0}'")]
    InvalidEntityName(String),

    #[error("entity '{entity}': invalid field name '{field}'")]
    InvalidFieldName { entity: String, field: String },

    #[error("hooks registered for unknown entity '{0}'")]
    HooksForUnknownEntity(String),
}
