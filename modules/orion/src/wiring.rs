//! Composition root: the only place where concrete collaborators are chosen.

use std::sync::Arc;

use anyhow::Context;
use orion_db::SqlExecutor;
use orion_query::{EntityHooks, Schema, SchemaError};
use orion_security::{AccessMode, RequestContext, RequestContextBuilder};

use crate::config::OrionConfig;
use crate::domain::{AssetStorage, EntityService, ErrorSink, PasswordHasher};
use crate::infra::{LocalDiskStorage, SaltedSha256Hasher, TracingErrorSink};

/// Custom authorization for one entity, attached in code.
pub type HookRegistration = (String, Arc<dyn EntityHooks>);

/// Non-database collaborators of the entity service.
#[derive(Clone)]
pub struct Collaborators {
    pub hasher: Arc<dyn PasswordHasher>,
    pub storage: Arc<dyn AssetStorage>,
    pub errors: Arc<dyn ErrorSink>,
}

impl Collaborators {
    /// Salted SHA-256 hashing, local-disk assets, tracing error log.
    #[must_use]
    pub fn from_config(config: &OrionConfig) -> Self {
        Self {
            hasher: Arc::new(SaltedSha256Hasher),
            storage: Arc::new(LocalDiskStorage::new(config.storage.root.clone())),
            errors: Arc::new(TracingErrorSink),
        }
    }
}

/// A wired service plus the request defaults taken from configuration.
pub struct Orion {
    service: EntityService,
    default_mode: AccessMode,
}

impl Orion {
    #[must_use]
    pub fn service(&self) -> &EntityService {
        &self.service
    }

    /// Request context builder preset with the configured access mode.
    #[must_use]
    pub fn context(&self, entity: &str) -> RequestContextBuilder {
        RequestContext::builder(entity).mode(self.default_mode)
    }
}

/// Merge configured entities over the built-ins and attach hooks.
///
/// # Errors
/// Any [`SchemaError`]; these are start-up configuration errors.
pub fn build_schema(
    config: &OrionConfig,
    hooks: impl IntoIterator<Item = HookRegistration>,
) -> Result<Schema, SchemaError> {
    hooks
        .into_iter()
        .fold(
            Schema::builder().entities(config.entities.iter().cloned()),
            |builder, (entity, h)| builder.hooks(entity, h),
        )
        .build()
}

/// Assemble the service over an explicit executor and collaborators.
///
/// # Errors
/// Invalid configuration or schema.
pub fn build(
    config: &OrionConfig,
    hooks: impl IntoIterator<Item = HookRegistration>,
    executor: Arc<dyn SqlExecutor>,
    collaborators: Collaborators,
) -> anyhow::Result<Orion> {
    config.validate().map_err(anyhow::Error::msg)?;
    if executor.dialect() != config.database.engine {
        anyhow::bail!(
            "executor speaks {} but database.engine is {}",
            executor.dialect(),
            config.database.engine
        );
    }
    let schema = build_schema(config, hooks).context("invalid entity configuration")?;
    tracing::info!(
        entities = schema.entities().count(),
        engine = %config.database.engine,
        mode = %config.access.default_mode,
        "orion wired"
    );

    let Collaborators {
        hasher,
        storage,
        errors,
    } = collaborators;
    Ok(Orion {
        service: EntityService::new(
            Arc::new(schema),
            executor,
            hasher,
            storage,
            errors,
            config.pagination.into(),
        ),
        default_mode: config.access.default_mode,
    })
}

/// Wire everything from configuration: the configured database engine and
/// the default collaborators. The pool opens on first use.
///
/// # Errors
/// Invalid configuration, schema, or an engine without an executor.
pub fn wire(
    config: &OrionConfig,
    hooks: impl IntoIterator<Item = HookRegistration>,
) -> anyhow::Result<Orion> {
    let executor = orion_db::connect(&config.database).context("database setup failed")?;
    build(config, hooks, executor, Collaborators::from_config(config))
}
