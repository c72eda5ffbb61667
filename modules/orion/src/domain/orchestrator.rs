//! Begin-write flow shared by create, update and delete.

use std::sync::Arc;

use futures::future::try_join_all;
use orion_db::{SelectSpec, SqlBuilder, SqlExecutor};
use orion_query::ast::{CompareOperator, Condition};
use orion_query::builtins::ID;
use orion_query::{Action, EntitySchema, FieldSchema, Record, Schema};
use orion_security::RequestContext;
use serde_json::Value;
use tracing::{debug, instrument};

use super::access::{
    allowed_fields, check_write_hook, establish_ownership, json_id, require_identity,
    validate_roles,
};
use super::error::DomainError;
use super::projection::project_row;

/// Authorized write, ready to be executed.
#[derive(Debug, Clone)]
pub struct WritePlan {
    pub action: Action,
    /// The stored record for update and delete.
    pub existing: Option<Record>,
    /// Incoming body; on create it also carries every resolved foreign
    /// record under its alias.
    pub body: Record,
}

pub struct WriteOrchestrator {
    schema: Arc<Schema>,
    executor: Arc<dyn SqlExecutor>,
    builder: SqlBuilder,
}

impl WriteOrchestrator {
    #[must_use]
    pub fn new(schema: Arc<Schema>, executor: Arc<dyn SqlExecutor>) -> Self {
        let builder = SqlBuilder::new(executor.dialect());
        Self {
            schema,
            executor,
            builder,
        }
    }

    /// Authorize a write against the entity named by `ctx`.
    ///
    /// Create: role check, foreign-key resolution, write hook.
    /// Update/delete: load the stored record, grant owner, role check, write
    /// hook. The first failing step aborts the rest.
    ///
    /// # Errors
    /// `Unauthorized`, `NotFound`, `Validation` for a body referencing a
    /// missing record, or a backend error from a lookup.
    #[instrument(skip_all, fields(entity = %ctx.entity(), %action, id = ?id))]
    pub async fn begin_write(
        &self,
        ctx: &mut RequestContext,
        action: Action,
        id: Option<i64>,
        mut body: Record,
    ) -> Result<WritePlan, DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        require_identity(ctx)?;

        match action {
            Action::Create => {
                validate_roles(ctx, entity, action)?;
                self.resolve_foreign_keys(entity, &mut body).await?;
                check_write_hook(ctx, entity, action, None, &body)?;
                Ok(WritePlan {
                    action,
                    existing: None,
                    body,
                })
            }
            Action::Update | Action::Delete => {
                let id = id.ok_or_else(|| DomainError::validation(ID, "is required"))?;
                let existing = self
                    .load(entity, id)
                    .await?
                    .ok_or_else(|| DomainError::not_found(entity.name(), id))?;
                establish_ownership(ctx, entity, &existing);
                validate_roles(ctx, entity, action)?;
                check_write_hook(ctx, entity, action, Some(&existing), &body)?;
                Ok(WritePlan {
                    action,
                    existing: Some(existing),
                    body,
                })
            }
            Action::Read => Err(DomainError::validation("action", "read is not a write")),
        }
    }

    /// Fetch one record by id with its readable columns.
    ///
    /// # Errors
    /// Backend failures.
    pub async fn load(&self, entity: &EntitySchema, id: i64) -> Result<Option<Record>, DomainError> {
        let fields = allowed_fields(entity, Action::Read);
        let condition = Condition::leaf(entity.name(), ID, CompareOperator::Eq, id);
        let query = self.builder.select(&SelectSpec {
            entity,
            fields: &fields,
            condition: &condition,
            joins: &[],
            order_by: "",
            skip: 0,
            take: 1,
            full: true,
        })?;
        let rows = self.executor.query(&query).await?;
        Ok(rows.into_iter().next().map(|row| project_row(entity, &[], row)))
    }

    /// Look up every referenced record concurrently and merge each under its
    /// alias once all of them are back.
    async fn resolve_foreign_keys(
        &self,
        entity: &EntitySchema,
        body: &mut Record,
    ) -> Result<(), DomainError> {
        let pending: Vec<(&FieldSchema, &Value)> = entity
            .foreign_keys()
            .filter_map(|f| body.get(&f.name).map(|v| (f, v)))
            .filter(|(_, v)| !is_empty(v))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        debug!(entity = entity.name(), lookups = pending.len(), "resolving foreign keys");

        let lookups = pending.into_iter().map(|(field, value)| async move {
            let Some(fk) = field.foreign_key.as_ref() else {
                return Err(DomainError::validation(&field.name, "is not a reference"));
            };
            let id = json_id(value)
                .ok_or_else(|| DomainError::validation(&field.name, "must be an integer id"))?;
            let target = self.schema.require(&fk.entity)?;
            let record = self.load(target, id).await?.ok_or_else(|| {
                DomainError::validation(&field.name, format!("{} {id} does not exist", fk.entity))
            })?;
            Ok::<_, DomainError>((fk.alias.clone(), record))
        });
        let resolved = try_join_all(lookups).await?;

        for (alias, record) in resolved {
            body.insert(alias, Value::Object(record));
        }
        Ok(())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
