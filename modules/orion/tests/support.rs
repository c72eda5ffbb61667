#![allow(clippy::unwrap_used, clippy::expect_used)]

//! In-process fakes for the entity service collaborators.

#![allow(dead_code)] // Support module provides utilities that may not all be used

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use orion::{
    AssetStorage, DomainError, EntityService, ErrorSink, PasswordHasher, ServiceConfig,
};
use orion_db::{DialectKind, SqlExecutor, SqlQuery};
use orion_query::{Action, CreateRequirement, EntityDef, FieldSchema, FieldType, Record, Schema};
use orion_security::RequestContext;
use serde_json::{Value, json};
use tokio::sync::Barrier;

/// Object literal to record.
#[must_use]
pub fn record(value: &Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

/// `category`, `supplier`, and an `item` referencing both.
#[must_use]
pub fn shop_schema() -> Schema {
    Schema::builder()
        .entity(
            EntityDef::new("category")
                .field(FieldSchema::new("title", FieldType::String))
                .roles(Action::Read, &["guest", "member", "owner", "admin"]),
        )
        .entity(
            EntityDef::new("supplier")
                .field(FieldSchema::new("name", FieldType::String))
                .roles(Action::Read, &["guest", "member", "owner", "admin"]),
        )
        .entity(
            EntityDef::new("item")
                .field(FieldSchema::new("name", FieldType::String).create(CreateRequirement::Required))
                .field(FieldSchema::new("price", FieldType::Float))
                .field(FieldSchema::new("instock", FieldType::Boolean))
                .field(FieldSchema::new("categoryid", FieldType::Id).references("category", "category"))
                .field(FieldSchema::new("supplierid", FieldType::Id).references("supplier", "supplier"))
                .roles(Action::Create, &["member", "admin"])
                .roles(Action::Read, &["guest", "member", "owner", "admin"])
                .roles(Action::Update, &["owner", "admin"])
                .roles(Action::Delete, &["owner", "admin"]),
        )
        .build()
        .unwrap()
}

struct Rule {
    pattern: String,
    rows: Vec<Record>,
}

/// Executor that records every statement and answers selects from rules
/// matched by SQL substring, first match wins. Unmatched selects return no
/// rows; unmatched counts return zero.
pub struct RecordingExecutor {
    dialect: DialectKind,
    rules: Mutex<Vec<Rule>>,
    queries: Mutex<Vec<SqlQuery>>,
    next_id: AtomicI64,
    select_barrier: Mutex<Option<Arc<Barrier>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new(dialect: DialectKind) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            rules: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            select_barrier: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn on(&self, pattern: &str, rows: Vec<Value>) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_owned(),
            rows: rows.iter().map(record).collect(),
        });
    }

    /// Make every select wait on `barrier` before answering.
    pub fn gate_selects(&self, barrier: Arc<Barrier>) {
        *self.select_barrier.lock().unwrap() = Some(barrier);
    }

    #[must_use]
    pub fn queries(&self) -> Vec<SqlQuery> {
        self.queries.lock().unwrap().clone()
    }

    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.queries().into_iter().map(|q| q.sql).collect()
    }

    /// Highest number of selects that were awaiting an answer at once.
    #[must_use]
    pub fn max_concurrent_selects(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, sql: &str) -> Vec<Record> {
        let rules = self.rules.lock().unwrap();
        if let Some(rule) = rules.iter().find(|r| sql.contains(&r.pattern)) {
            return rule.rows.clone();
        }
        if sql.starts_with("SELECT COUNT(*)") {
            return vec![record(&json!({"count": 0}))];
        }
        Vec::new()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    fn dialect(&self) -> DialectKind {
        self.dialect
    }

    async fn ensure_initialized(&self) -> orion_db::Result<()> {
        Ok(())
    }

    async fn query(&self, query: &SqlQuery) -> orion_db::Result<Vec<Record>> {
        self.queries.lock().unwrap().push(query.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let barrier = self.select_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.answer(&query.sql))
    }

    async fn execute(&self, query: &SqlQuery) -> orion_db::Result<u64> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(1)
    }

    async fn insert(&self, query: &SqlQuery) -> orion_db::Result<i64> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// Asset storage kept in a map.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Bytes>>,
    counter: AtomicUsize,
}

impl MemoryStorage {
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.files.lock().unwrap().contains_key(filename)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetStorage for MemoryStorage {
    async fn upload(&self, _original_name: &str, bytes: Bytes) -> Result<String, DomainError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let name = format!("file-{n}");
        self.files.lock().unwrap().insert(name.clone(), bytes);
        Ok(name)
    }

    async fn delete(&self, filename: &str) -> Result<(), DomainError> {
        self.files
            .lock()
            .unwrap()
            .remove(filename)
            .map(|_| ())
            .ok_or_else(|| DomainError::asset_storage(format!("{filename} missing")))
    }
}

/// Marks the password instead of hashing it.
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plain: &str) -> Result<String, DomainError> {
        Ok(format!("hashed:{plain}"))
    }
}

/// Keeps the tags of every recorded error.
#[derive(Default)]
pub struct RecordingSink {
    tags: Mutex<Vec<&'static str>>,
}

impl RecordingSink {
    #[must_use]
    pub fn tags(&self) -> Vec<&'static str> {
        self.tags.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorSink for RecordingSink {
    async fn record(&self, _ctx: &RequestContext, error: &DomainError) -> anyhow::Result<()> {
        self.tags.lock().unwrap().push(error.tag());
        Ok(())
    }
}

/// Sink whose backend is down.
#[derive(Default)]
pub struct FailingSink {
    calls: AtomicUsize,
}

impl FailingSink {
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ErrorSink for FailingSink {
    async fn record(&self, _ctx: &RequestContext, _error: &DomainError) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("error log table unavailable")
    }
}

/// Service over the shop schema and the given executor.
pub struct Harness {
    pub service: EntityService,
    pub executor: Arc<RecordingExecutor>,
    pub storage: Arc<MemoryStorage>,
    pub sink: Arc<RecordingSink>,
}

#[must_use]
pub fn harness(dialect: DialectKind) -> Harness {
    harness_with(shop_schema(), dialect)
}

#[must_use]
pub fn harness_with(schema: Schema, dialect: DialectKind) -> Harness {
    let executor = RecordingExecutor::new(dialect);
    let storage = Arc::new(MemoryStorage::default());
    let sink = Arc::new(RecordingSink::default());
    let service = EntityService::new(
        Arc::new(schema),
        executor.clone(),
        Arc::new(PlainHasher),
        storage.clone(),
        sink.clone(),
        ServiceConfig::default(),
    );
    Harness {
        service,
        executor,
        storage,
        sink,
    }
}

#[must_use]
pub fn member(entity: &str, user_id: i64) -> RequestContext {
    RequestContext::builder(entity)
        .user_id(user_id)
        .role("member")
        .build()
}
