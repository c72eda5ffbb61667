//! `MySQL` executor over a lazily created sqlx pool.

use async_trait::async_trait;
use orion_query::Record;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row};
use tokio::sync::OnceCell;

use crate::config::{DbConfig, redact_dsn};
use crate::dialect::DialectKind;
use crate::executor::SqlExecutor;
use crate::pool_opts::ApplyPoolOpts;
use crate::query::{SqlQuery, SqlValue};
use crate::{DbError, Result};

pub struct MySqlExecutor {
    cfg: DbConfig,
    pool: OnceCell<MySqlPool>,
}

impl MySqlExecutor {
    #[must_use]
    pub fn new(cfg: DbConfig) -> Self {
        Self {
            cfg,
            pool: OnceCell::new(),
        }
    }

    /// Whether the pool has been created.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    async fn pool(&self) -> Result<&MySqlPool> {
        self.pool
            .get_or_try_init(|| async {
                tracing::info!(dsn = %redact_dsn(&self.cfg.dsn), "creating MySQL pool");
                MySqlPoolOptions::new()
                    .apply(&self.cfg.pool)
                    .connect(&self.cfg.dsn)
                    .await
                    .map_err(DbError::from)
            })
            .await
    }
}

impl std::fmt::Debug for MySqlExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlExecutor")
            .field("dsn", &redact_dsn(&self.cfg.dsn))
            .field("pool", &self.pool.initialized())
            .finish()
    }
}

#[async_trait]
impl SqlExecutor for MySqlExecutor {
    fn dialect(&self) -> DialectKind {
        DialectKind::MySql
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn query(&self, query: &SqlQuery) -> Result<Vec<Record>> {
        let pool = self.pool().await?;
        let rows = bind_all(sqlx::query(&query.sql), &query.params)
            .fetch_all(pool)
            .await?;
        tracing::debug!(sql = %query.sql, rows = rows.len(), "query executed");
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn execute(&self, query: &SqlQuery) -> Result<u64> {
        let pool = self.pool().await?;
        let result = bind_all(sqlx::query(&query.sql), &query.params)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, query: &SqlQuery) -> Result<i64> {
        let pool = self.pool().await?;
        let result = bind_all(sqlx::query(&query.sql), &query.params)
            .execute(pool)
            .await?;
        let id = result.last_insert_id();
        i64::try_from(id).map_err(|_| DbError::IdOutOfRange(id))
    }
}

fn bind_all<'q>(
    mut query: Query<'q, sqlx::MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, sqlx::MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

fn row_to_record(row: &MySqlRow) -> Record {
    row.columns()
        .iter()
        .map(|column| (column.name().to_owned(), decode_column(row, column.ordinal())))
        .collect()
}

/// Decode a column into JSON by trying the types Orion stores, narrowest
/// first.
fn decode_column(row: &MySqlRow, index: usize) -> serde_json::Value {
    use serde_json::Value;

    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(Value::Null, |bytes| {
            Value::from(String::from_utf8_lossy(&bytes).into_owned())
        });
    }
    tracing::warn!(column = index, "unsupported column type, returning null");
    Value::Null
}
