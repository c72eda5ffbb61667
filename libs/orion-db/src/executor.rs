//! SQL execution collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use orion_query::Record;

use crate::config::{DbConfig, redact_dsn};
use crate::dialect::DialectKind;
use crate::mysql::MySqlExecutor;
use crate::query::SqlQuery;
use crate::{DbError, Result};

/// Runs rendered statements. Errors are surfaced as-is; retry policy, if any,
/// belongs to the implementation or an outer layer.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    fn dialect(&self) -> DialectKind;

    /// Create the connection pool if it does not exist yet. Idempotent and
    /// safe to call concurrently.
    async fn ensure_initialized(&self) -> Result<()>;

    /// Run a statement that returns rows.
    async fn query(&self, query: &SqlQuery) -> Result<Vec<Record>>;

    /// Run a statement for its side effect; returns the affected row count.
    async fn execute(&self, query: &SqlQuery) -> Result<u64>;

    /// Run an insert and return the generated id.
    async fn insert(&self, query: &SqlQuery) -> Result<i64>;

    /// Run a `COUNT(*)` statement and return the count as one integer.
    async fn count(&self, query: &SqlQuery) -> Result<i64> {
        let rows = self.query(query).await?;
        normalize_count(self.dialect(), rows.first())
    }
}

/// Extract the count from the first row. The column key is dialect specific;
/// when it is absent the first value of the row is used.
///
/// # Errors
/// Returns `DbError::InvalidCount` when there is no row or no integer value.
pub fn normalize_count(dialect: DialectKind, row: Option<&Record>) -> Result<i64> {
    let row = row.ok_or(DbError::InvalidCount)?;
    let value = row
        .get(dialect.dialect().count_key())
        .or_else(|| row.values().next())
        .ok_or(DbError::InvalidCount)?;
    match value {
        serde_json::Value::Number(n) => n.as_i64().ok_or(DbError::InvalidCount),
        serde_json::Value::String(s) => s.parse().map_err(|_| DbError::InvalidCount),
        _ => Err(DbError::InvalidCount),
    }
}

/// Build the executor for the configured engine. The pool itself is created
/// lazily on first use.
///
/// # Errors
/// Returns `DbError::UnsupportedEngine` for engines without a driver and
/// `DbError::InvalidConfig` for an empty DSN.
pub fn connect(cfg: &DbConfig) -> Result<Arc<dyn SqlExecutor>> {
    if cfg.dsn.is_empty() {
        return Err(DbError::InvalidConfig("database.dsn is empty".to_owned()));
    }
    tracing::info!(engine = %cfg.engine, dsn = %redact_dsn(&cfg.dsn), "configuring SQL executor");
    match cfg.engine {
        DialectKind::MySql => Ok(Arc::new(MySqlExecutor::new(cfg.clone()))),
        DialectKind::MsSql => Err(DbError::UnsupportedEngine(cfg.engine)),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: &serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn count_uses_dialect_key_then_first_value() {
        let mssql = row(&json!({ "": 12 }));
        assert_eq!(normalize_count(DialectKind::MsSql, Some(&mssql)).unwrap(), 12);

        let mysql = row(&json!({ "count": "7" }));
        assert_eq!(normalize_count(DialectKind::MySql, Some(&mysql)).unwrap(), 7);

        let other = row(&json!({ "COUNT(*)": 3 }));
        assert_eq!(normalize_count(DialectKind::MySql, Some(&other)).unwrap(), 3);
    }

    #[test]
    fn count_without_row_fails() {
        assert!(matches!(
            normalize_count(DialectKind::MySql, None),
            Err(DbError::InvalidCount)
        ));
    }

    #[test]
    fn mssql_has_no_driver() {
        let cfg = DbConfig {
            engine: DialectKind::MsSql,
            dsn: "mssql://sa:pw@db/orion".to_owned(),
            ..DbConfig::default()
        };
        assert!(matches!(connect(&cfg), Err(DbError::UnsupportedEngine(DialectKind::MsSql))));
    }
}
