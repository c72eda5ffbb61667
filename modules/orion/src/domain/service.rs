use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use orion_db::{SelectSpec, SqlBuilder, SqlExecutor, SqlValue};
use orion_query::ast::{CompareOperator, Condition};
use orion_query::builtins::{ASSET, CREATED_TIME, ID, OWNER_ID, USER};
use orion_query::{Action, CreateRequirement, EntitySchema, Join, Record, Schema, parse_encoded};
use orion_security::{RequestContext, roles};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::access::{allowed_fields, establish_ownership, scope_read, validate_roles};
use super::error::DomainError;
use super::orchestrator::WriteOrchestrator;
use super::ports::{AssetStorage, ErrorSink, PasswordHasher};
use super::projection::project_row;

/// Domain assigned to accounts created through the user path.
const LOCAL_DOMAIN: &str = "local";

#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub default_take: i64,
    pub max_take: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_take: 50,
            max_take: 1000,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn clamp_take(&self, take: Option<i64>) -> i64 {
        take.filter(|t| *t > 0)
            .unwrap_or(self.default_take)
            .min(self.max_take)
    }
}

/// Query-string parameters of a list request, still URL-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub condition: String,
    pub order_by: String,
    pub skip: i64,
    pub take: Option<i64>,
    pub full: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Record>,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// CRUD over every configured entity. Each call takes the request context
/// of its caller; the context's role list may grow by `owner` during the
/// call.
pub struct EntityService {
    schema: Arc<Schema>,
    executor: Arc<dyn SqlExecutor>,
    builder: SqlBuilder,
    orchestrator: WriteOrchestrator,
    hasher: Arc<dyn PasswordHasher>,
    storage: Arc<dyn AssetStorage>,
    errors: Arc<dyn ErrorSink>,
    config: ServiceConfig,
}

impl EntityService {
    #[must_use]
    pub fn new(
        schema: Arc<Schema>,
        executor: Arc<dyn SqlExecutor>,
        hasher: Arc<dyn PasswordHasher>,
        storage: Arc<dyn AssetStorage>,
        errors: Arc<dyn ErrorSink>,
        config: ServiceConfig,
    ) -> Self {
        let builder = SqlBuilder::new(executor.dialect());
        let orchestrator = WriteOrchestrator::new(schema.clone(), executor.clone());
        Self {
            schema,
            executor,
            builder,
            orchestrator,
            hasher,
            storage,
            errors,
            config,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Open the database pool ahead of the first request.
    ///
    /// # Errors
    /// Connection failures.
    pub async fn ensure_ready(&self) -> Result<(), DomainError> {
        self.executor.ensure_initialized().await?;
        Ok(())
    }

    /// One page of records plus the total matching the same condition.
    ///
    /// # Errors
    /// `Query` for a bad condition or order-by, `Unauthorized`, or a backend
    /// error.
    #[instrument(skip_all, fields(entity = %ctx.entity(), user_id = ?ctx.user_id()))]
    pub async fn list(
        &self,
        ctx: &mut RequestContext,
        request: &ListRequest,
    ) -> Result<Page, DomainError> {
        let result = self.list_inner(ctx, request).await;
        self.report(ctx, result).await
    }

    /// Number of records matching an encoded condition.
    ///
    /// # Errors
    /// Same as [`Self::list`].
    #[instrument(skip_all, fields(entity = %ctx.entity(), user_id = ?ctx.user_id()))]
    pub async fn count(&self, ctx: &mut RequestContext, condition: &str) -> Result<i64, DomainError> {
        let result = self.count_inner(ctx, condition).await;
        self.report(ctx, result).await
    }

    /// # Errors
    /// `NotFound` when no visible record has this id.
    #[instrument(skip_all, fields(entity = %ctx.entity(), user_id = ?ctx.user_id(), id = id))]
    pub async fn get(&self, ctx: &mut RequestContext, id: i64) -> Result<Record, DomainError> {
        let result = self.get_inner(ctx, id).await;
        self.report(ctx, result).await
    }

    /// Insert a record and return it as the caller would read it.
    ///
    /// # Errors
    /// `Validation` for unknown, system-managed or missing required fields,
    /// `Conflict` for a taken username, `Unauthorized`, or a backend error.
    #[instrument(skip_all, fields(entity = %ctx.entity(), user_id = ?ctx.user_id()))]
    pub async fn create(&self, ctx: &mut RequestContext, body: Record) -> Result<Record, DomainError> {
        let result = self.create_inner(ctx, body).await;
        self.report(ctx, result).await
    }

    /// # Errors
    /// `Validation` for fields outside the editable set, `NotFound`,
    /// `Unauthorized`, or a backend error.
    #[instrument(skip_all, fields(entity = %ctx.entity(), user_id = ?ctx.user_id(), id = id))]
    pub async fn update(
        &self,
        ctx: &mut RequestContext,
        id: i64,
        body: Record,
    ) -> Result<Record, DomainError> {
        let result = self.update_inner(ctx, id, body).await;
        self.report(ctx, result).await
    }

    /// Delete a record. For assets the stored file is removed afterwards.
    ///
    /// # Errors
    /// `NotFound`, `Unauthorized`, or a backend error.
    #[instrument(skip_all, fields(entity = %ctx.entity(), user_id = ?ctx.user_id(), id = id))]
    pub async fn delete(&self, ctx: &mut RequestContext, id: i64) -> Result<(), DomainError> {
        let result = self.delete_inner(ctx, id).await;
        self.report(ctx, result).await
    }

    /// Store an uploaded file and record it as an `asset`.
    ///
    /// # Errors
    /// `Unauthorized`, `AssetStorage`, or a backend error.
    #[instrument(
        skip_all,
        fields(user_id = ?ctx.user_id(), name = %upload.original_name, size = upload.bytes.len())
    )]
    pub async fn create_asset(
        &self,
        ctx: &mut RequestContext,
        upload: AssetUpload,
    ) -> Result<Record, DomainError> {
        let result = self.create_asset_inner(ctx, upload).await;
        self.report(ctx, result).await
    }

    async fn list_inner(
        &self,
        ctx: &mut RequestContext,
        request: &ListRequest,
    ) -> Result<Page, DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        let (condition, joins) = self.prepare_read(ctx, entity, &request.condition)?;
        validate_roles(ctx, entity, Action::Read)?;

        let fields = allowed_fields(entity, Action::Read);
        let select = self.builder.select(&SelectSpec {
            entity,
            fields: &fields,
            condition: &condition,
            joins: &joins,
            order_by: &request.order_by,
            skip: request.skip.max(0),
            take: self.config.clamp_take(request.take),
            full: request.full,
        })?;
        let rows = self.executor.query(&select).await?;
        let total = self
            .executor
            .count(&self.builder.count(entity, &condition, &joins))
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(|row| project_row(entity, &joins, row))
                .collect(),
            total,
        })
    }

    async fn count_inner(&self, ctx: &mut RequestContext, raw: &str) -> Result<i64, DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        let (condition, joins) = self.prepare_read(ctx, entity, raw)?;
        validate_roles(ctx, entity, Action::Read)?;
        let total = self
            .executor
            .count(&self.builder.count(entity, &condition, &joins))
            .await?;
        Ok(total)
    }

    async fn get_inner(&self, ctx: &mut RequestContext, id: i64) -> Result<Record, DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        let by_id = Condition::leaf(entity.name(), ID, CompareOperator::Eq, id);
        let condition = scope_read(ctx, entity, by_id)?;
        let joins = Join::for_entity(&self.schema, entity.name())?;

        let fields = allowed_fields(entity, Action::Read);
        let select = self.builder.select(&SelectSpec {
            entity,
            fields: &fields,
            condition: &condition,
            joins: &joins,
            order_by: "",
            skip: 0,
            take: 1,
            full: true,
        })?;
        let row = self.executor.query(&select).await?.into_iter().next();

        // Roles are checked before existence is revealed.
        if let Some(row) = &row {
            establish_ownership(ctx, entity, row);
        }
        validate_roles(ctx, entity, Action::Read)?;

        row.map(|row| project_row(entity, &joins, row))
            .ok_or_else(|| DomainError::not_found(entity.name(), id))
    }

    async fn create_inner(
        &self,
        ctx: &mut RequestContext,
        body: Record,
    ) -> Result<Record, DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        if entity.name() == ASSET {
            return Err(DomainError::validation(
                "entity",
                "assets are created by uploading a file",
            ));
        }
        validate_create_body(entity, &body)?;

        let plan = self
            .orchestrator
            .begin_write(ctx, Action::Create, None, body)
            .await?;

        let (mut columns, resolved) = split_columns(entity, plan.body);
        if entity.name() == USER {
            self.prepare_user(entity, &mut columns).await?;
        }

        let mut created = self.insert_row(ctx, entity, columns).await?;
        created.extend(resolved);
        Ok(created)
    }

    async fn update_inner(
        &self,
        ctx: &mut RequestContext,
        id: i64,
        body: Record,
    ) -> Result<Record, DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        let editable = allowed_fields(entity, Action::Update);
        if let Some(field) = body.keys().find(|k| !editable.contains(k)) {
            return Err(DomainError::validation(field.as_str(), "is not editable"));
        }
        if body.is_empty() {
            return Err(DomainError::validation("body", "no fields to update"));
        }

        let plan = self
            .orchestrator
            .begin_write(ctx, Action::Update, Some(id), body)
            .await?;

        let values = sql_values(&plan.body);
        let by_id = Condition::leaf(entity.name(), ID, CompareOperator::Eq, id);
        let affected = self
            .executor
            .execute(&self.builder.update(entity, &values, &by_id))
            .await?;
        info!(entity = entity.name(), id, affected, user_id = ?ctx.user_id(), "record updated");

        let mut updated = plan.existing.unwrap_or_default();
        updated.extend(plan.body);
        Ok(project_row(entity, &[], updated))
    }

    async fn delete_inner(&self, ctx: &mut RequestContext, id: i64) -> Result<(), DomainError> {
        let entity = self.schema.require(ctx.entity())?;
        let plan = self
            .orchestrator
            .begin_write(ctx, Action::Delete, Some(id), Record::new())
            .await?;

        let affected = self
            .executor
            .execute(&self.builder.delete(entity, id))
            .await?;
        info!(entity = entity.name(), id, affected, user_id = ?ctx.user_id(), "record deleted");

        if entity.name() == ASSET {
            let filename = plan
                .existing
                .as_ref()
                .and_then(|r| r.get("filename"))
                .and_then(Value::as_str);
            if let Some(filename) = filename {
                self.storage.delete(filename).await?;
            }
        }
        Ok(())
    }

    async fn create_asset_inner(
        &self,
        ctx: &mut RequestContext,
        upload: AssetUpload,
    ) -> Result<Record, DomainError> {
        if ctx.entity() != ASSET {
            return Err(DomainError::validation(
                "entity",
                format!("uploads are stored as {ASSET}, not {}", ctx.entity()),
            ));
        }
        let entity = self.schema.require(ASSET)?;
        if upload.original_name.is_empty() {
            return Err(DomainError::validation("originalname", "is required"));
        }

        let mut body = Record::new();
        body.insert("originalname".to_owned(), Value::from(upload.original_name.as_str()));
        let plan = self
            .orchestrator
            .begin_write(ctx, Action::Create, None, body)
            .await?;

        let size = i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX);
        let filename = self
            .storage
            .upload(&upload.original_name, upload.bytes)
            .await?;

        let (mut columns, _) = split_columns(entity, plan.body);
        columns.insert("filename".to_owned(), Value::from(filename.as_str()));
        columns.insert("contenttype".to_owned(), Value::from(upload.content_type));
        columns.insert("size".to_owned(), Value::from(size));

        match self.insert_row(ctx, entity, columns).await {
            Ok(created) => Ok(created),
            Err(e) => {
                // the row never landed, so the file is orphaned
                if let Err(cleanup) = self.storage.delete(&filename).await {
                    warn!(%filename, error = %cleanup, "failed to remove orphaned asset");
                }
                Err(e)
            }
        }
    }

    /// Apply ownership scoping and the custom read condition to an encoded
    /// condition, and resolve the joins every read carries.
    fn prepare_read(
        &self,
        ctx: &mut RequestContext,
        entity: &EntitySchema,
        raw: &str,
    ) -> Result<(Condition, Vec<Join>), DomainError> {
        let condition = parse_encoded(entity, raw)?.unwrap_or_else(Condition::always_true);
        let condition = scope_read(ctx, entity, condition)?;
        let joins = Join::for_entity(&self.schema, entity.name())?;
        Ok((condition, joins))
    }

    /// Username uniqueness, password hashing and the account defaults.
    async fn prepare_user(
        &self,
        entity: &EntitySchema,
        columns: &mut Record,
    ) -> Result<(), DomainError> {
        let username = columns
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| DomainError::validation("username", "must be a string"))?;

        let taken = Condition::leaf(entity.name(), "username", CompareOperator::Eq, username.as_str());
        let fields = vec![ID.to_owned()];
        let existing = self
            .executor
            .query(&self.builder.select(&SelectSpec {
                entity,
                fields: &fields,
                condition: &taken,
                joins: &[],
                order_by: "",
                skip: 0,
                take: 1,
                full: false,
            })?)
            .await?;
        if !existing.is_empty() {
            return Err(DomainError::conflict("username", username));
        }

        let password = columns
            .get("password")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::validation("password", "must be a string"))?;
        let hashed = self.hasher.hash(password).await?;

        columns.insert("password".to_owned(), Value::from(hashed));
        columns.insert("roles".to_owned(), Value::from(roles::MEMBER));
        columns.insert("domain".to_owned(), Value::from(LOCAL_DOMAIN));
        columns.insert("domainid".to_owned(), Value::from(username));
        Ok(())
    }

    /// Stamp owner and creation time, insert, and return the projected row.
    async fn insert_row(
        &self,
        ctx: &RequestContext,
        entity: &EntitySchema,
        mut columns: Record,
    ) -> Result<Record, DomainError> {
        columns.insert(
            OWNER_ID.to_owned(),
            ctx.user_id().map_or(Value::Null, Value::from),
        );
        columns.insert(
            CREATED_TIME.to_owned(),
            Value::from(Utc::now().timestamp_millis()),
        );

        let values = sql_values(&columns);
        let id = self
            .executor
            .insert(&self.builder.insert(entity, &values))
            .await?;
        info!(entity = entity.name(), id, user_id = ?ctx.user_id(), "record created");

        columns.insert(ID.to_owned(), Value::from(id));
        Ok(project_row(entity, &[], columns))
    }

    async fn report<T>(
        &self,
        ctx: &RequestContext,
        result: Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        if let Err(error) = &result {
            if let Err(sink_error) = self.errors.record(ctx, error).await {
                warn!(error = %error, sink_error = %sink_error, "failed to record request error");
            }
        }
        result
    }
}

/// Reject unknown and system-managed fields, require the required ones.
fn validate_create_body(entity: &EntitySchema, body: &Record) -> Result<(), DomainError> {
    for key in body.keys() {
        let field = entity
            .field(key)
            .ok_or_else(|| DomainError::validation(key.as_str(), "unknown field"))?;
        if field.create == CreateRequirement::None {
            return Err(DomainError::validation(key.as_str(), "cannot be set on create"));
        }
    }
    for field in entity.fields() {
        if field.create != CreateRequirement::Required {
            continue;
        }
        let present = body.get(&field.name).is_some_and(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        });
        if !present {
            return Err(DomainError::validation(field.name.as_str(), "is required"));
        }
    }
    Ok(())
}

/// Split a planned body into entity columns and resolved foreign records.
fn split_columns(entity: &EntitySchema, body: Record) -> (Record, Record) {
    body.into_iter()
        .partition(|(key, _)| entity.field(key).is_some())
}

fn sql_values(columns: &Record) -> Vec<(String, SqlValue)> {
    columns
        .iter()
        .map(|(k, v)| (k.clone(), SqlValue::from_json(v)))
        .collect()
}
