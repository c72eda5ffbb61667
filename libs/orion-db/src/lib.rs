#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! SQL side of Orion.
//!
//! One [`SqlBuilder`] emits select/count/insert/update/delete statements for
//! every supported backend; the differences between backends live behind the
//! small [`Dialect`] strategy. Statements are executed by a [`SqlExecutor`],
//! of which a lazily pooled `MySQL` implementation is provided.

pub mod config;
pub mod dialect;
pub mod executor;
pub mod mysql;
pub mod query;

mod pool_opts;

pub use config::{DbConfig, PoolCfg, redact_dsn};
pub use dialect::{Dialect, DialectKind, MsSql, MySql};
pub use executor::{SqlExecutor, connect, normalize_count};
pub use mysql::MySqlExecutor;
pub use query::{SelectSpec, SqlBuilder, SqlQuery, SqlValue};

use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No executor available for engine '{0}'")]
    UnsupportedEngine(DialectKind),

    #[error("Count query returned no usable value")]
    InvalidCount,

    #[error("Generated id {0} does not fit a signed 64-bit integer")]
    IdOutOfRange(u64),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
