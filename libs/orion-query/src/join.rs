//! Foreign-key joins.

use crate::errors::QueryError;
use crate::schema::Schema;

/// One aliased LEFT JOIN from a source entity to the entity a reference
/// field points at. Built per query, never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub source_entity: String,
    pub source_table: String,
    pub target_entity: String,
    pub target_table: String,
    pub target_alias: String,
    pub source_join_field: String,
    pub target_join_field: String,
    /// Target columns to select; secret fields are never included.
    pub target_select_fields: Vec<String>,
}

impl Join {
    /// Resolve the join for `entity.field`.
    ///
    /// Alias uniqueness within one query is the caller's concern; the schema
    /// builder already rejects entities whose foreign keys share an alias.
    ///
    /// # Errors
    /// Returns `UnknownEntity`/`UnknownField` if either is absent, and
    /// `NotForeignKey` if the field declares no foreign key.
    pub fn for_foreign_key(schema: &Schema, entity: &str, field: &str) -> Result<Self, QueryError> {
        let source = schema.require(entity)?;
        let fk = source
            .require_field(field)?
            .foreign_key
            .as_ref()
            .ok_or_else(|| QueryError::NotForeignKey {
                entity: entity.to_owned(),
                field: field.to_owned(),
            })?;
        let target = schema.require(&fk.entity)?;

        let target_select_fields = target
            .fields()
            .iter()
            .filter(|f| !f.is_secret())
            .map(|f| f.name.clone())
            .collect();

        Ok(Join {
            source_entity: source.name().to_owned(),
            source_table: source.table().to_owned(),
            target_entity: target.name().to_owned(),
            target_table: target.table().to_owned(),
            target_alias: fk.alias.clone(),
            source_join_field: field.to_owned(),
            target_join_field: "id".to_owned(),
            target_select_fields,
        })
    }

    /// Joins for every foreign key the entity declares, in field order.
    ///
    /// # Errors
    /// Returns `UnknownEntity` if the entity is absent.
    pub fn for_entity(schema: &Schema, entity: &str) -> Result<Vec<Self>, QueryError> {
        schema
            .require(entity)?
            .foreign_keys()
            .map(|f| Self::for_foreign_key(schema, entity, &f.name))
            .collect()
    }

    /// Flattened result column name, `<alias>_<field>`.
    #[must_use]
    pub fn column_alias(&self, field: &str) -> String {
        format!("{}_{field}", self.target_alias)
    }
}
