use std::collections::HashSet;

use orion_query::ast::{CompareOperator, Condition};
use orion_query::{EntitySchema, FieldType, Join, OrderKey, QueryError, SortDir};

use super::condition::Emitter;
use crate::dialect::{Dialect, DialectKind};
use crate::query::{SqlQuery, SqlValue};

/// Inputs of a paged select.
#[derive(Clone, Copy, Debug)]
pub struct SelectSpec<'a> {
    pub entity: &'a EntitySchema,
    /// Base columns to select, normally the readable fields of the entity.
    pub fields: &'a [String],
    pub condition: &'a Condition,
    pub joins: &'a [Join],
    /// Raw, URL-encoded order-by token (`name`, `~name`, or empty).
    pub order_by: &'a str,
    pub skip: i64,
    pub take: i64,
    /// Include rich-text columns.
    pub full: bool,
}

/// Renders statements for one dialect. Stateless; every call starts a fresh
/// statement.
#[derive(Clone, Copy, Debug)]
pub struct SqlBuilder {
    dialect: &'static dyn Dialect,
}

impl SqlBuilder {
    #[must_use]
    pub fn new(kind: DialectKind) -> Self {
        Self {
            dialect: kind.dialect(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    /// `SELECT ... FROM ... [LEFT JOIN ...] WHERE ... ORDER BY ... <page>`.
    ///
    /// # Errors
    /// Returns `QueryError` for an unknown field or order-by token, or when
    /// two joins share an alias.
    pub fn select(&self, spec: &SelectSpec<'_>) -> Result<SqlQuery, QueryError> {
        let entity = spec.entity;
        let order = OrderKey::parse(entity, spec.order_by)?;
        let mut e = Emitter::new(self.dialect);

        let mut columns = Vec::with_capacity(spec.fields.len());
        for name in spec.fields {
            let field = entity.require_field(name)?;
            let rich = field.kind == FieldType::RichText || name.contains("richtext");
            if rich && !spec.full {
                continue;
            }
            columns.push(e.column(entity.table(), name));
        }

        let mut aliases = HashSet::new();
        for join in spec.joins {
            if !aliases.insert(join.target_alias.as_str()) {
                return Err(QueryError::DuplicateJoinAlias(join.target_alias.clone()));
            }
            for field in &join.target_select_fields {
                let column = e.column(&join.target_alias, field);
                let alias = e.quote(&join.column_alias(field));
                columns.push(format!("{column} AS {alias}"));
            }
        }

        let from = from_clause(&e, entity, spec.joins);
        let filter = e.condition(spec.condition);
        let direction = match order.dir {
            SortDir::Asc => "",
            SortDir::Desc => " DESC",
        };
        let order_column = e.column(entity.table(), &order.field);
        let page = e.pagination(spec.skip, spec.take);

        let sql = format!(
            "SELECT {} FROM {from} WHERE {filter} ORDER BY {order_column}{direction} {page}",
            columns.join(", ")
        );
        tracing::debug!(entity = entity.name(), sql = %sql, "select");
        Ok(e.finish(sql))
    }

    /// `SELECT COUNT(*) FROM ... WHERE ...`.
    #[must_use]
    pub fn count(&self, entity: &EntitySchema, condition: &Condition, joins: &[Join]) -> SqlQuery {
        let mut e = Emitter::new(self.dialect);
        let from = from_clause(&e, entity, joins);
        let filter = e.condition(condition);
        let sql = format!("SELECT COUNT(*) FROM {from} WHERE {filter}");
        tracing::debug!(entity = entity.name(), sql = %sql, "count");
        e.finish(sql)
    }

    /// `INSERT INTO ... (...) VALUES (...)`, followed by the dialect's
    /// identity query when it has one.
    #[must_use]
    pub fn insert(&self, entity: &EntitySchema, values: &[(String, SqlValue)]) -> SqlQuery {
        let mut e = Emitter::new(self.dialect);
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (name, value) in values {
            columns.push(e.quote(name));
            placeholders.push(e.bind(value.clone()));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            e.quote(entity.table()),
            columns.join(", "),
            placeholders.join(", ")
        );
        if let Some(identity) = self.dialect.last_insert_id_clause() {
            sql.push_str("; ");
            sql.push_str(identity);
        }
        tracing::debug!(entity = entity.name(), sql = %sql, "insert");
        e.finish(sql)
    }

    /// `UPDATE ... SET f1 = ?, ... WHERE ...`. Assignments are emitted in the
    /// order given.
    #[must_use]
    pub fn update(
        &self,
        entity: &EntitySchema,
        values: &[(String, SqlValue)],
        condition: &Condition,
    ) -> SqlQuery {
        let mut e = Emitter::new(self.dialect);
        let assignments: Vec<String> = values
            .iter()
            .map(|(name, value)| {
                let column = e.quote(name);
                let placeholder = e.bind(value.clone());
                format!("{column} = {placeholder}")
            })
            .collect();
        let filter = e.condition(condition);
        let sql = format!(
            "UPDATE {} SET {} WHERE {filter}",
            e.quote(entity.table()),
            assignments.join(", ")
        );
        tracing::debug!(entity = entity.name(), sql = %sql, "update");
        e.finish(sql)
    }

    /// `DELETE FROM ... WHERE <table>.id = ?`.
    #[must_use]
    pub fn delete(&self, entity: &EntitySchema, id: i64) -> SqlQuery {
        let mut e = Emitter::new(self.dialect);
        let filter = e.condition(&Condition::leaf(
            entity.name(),
            "id",
            CompareOperator::Eq,
            id,
        ));
        let sql = format!("DELETE FROM {} WHERE {filter}", e.quote(entity.table()));
        tracing::debug!(entity = entity.name(), sql = %sql, "delete");
        e.finish(sql)
    }
}

fn from_clause(e: &Emitter, entity: &EntitySchema, joins: &[Join]) -> String {
    let mut parts = vec![e.quote(entity.table())];
    parts.extend(joins.iter().map(|join| {
        format!(
            "LEFT JOIN {} AS {} ON {} = {}",
            e.quote(&join.target_table),
            e.quote(&join.target_alias),
            e.column(&join.source_table, &join.source_join_field),
            e.column(&join.target_alias, &join.target_join_field),
        )
    }));
    parts.join(" ")
}
