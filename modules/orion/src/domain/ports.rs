//! Collaborators the entity service depends on.

use async_trait::async_trait;
use bytes::Bytes;
use orion_security::RequestContext;

use crate::domain::error::DomainError;

/// One-way password hashing for the `user` create path.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plain: &str) -> Result<String, DomainError>;
}

/// Blob storage behind the `asset` entity.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Store the bytes and return the generated file name.
    async fn upload(&self, original_name: &str, bytes: Bytes) -> Result<String, DomainError>;

    async fn delete(&self, filename: &str) -> Result<(), DomainError>;
}

/// Destination for request errors (error log table, external tracker...).
/// A failing sink must never replace the error being reported.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn record(&self, ctx: &RequestContext, error: &DomainError) -> anyhow::Result<()>;
}
