//! Persistence seam. The service layer talks to a `Store`; implementations
//! provide atomicity and row-level revision checks. Identity is owned by the
//! store: inserts assign a fresh UUIDv4.

pub mod memory;
pub mod postgres;

use crate::error::AppError;
use crate::schema::{EntityKind, SchemaRegistry};
use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A persisted row: identity, revision counter and the JSON body (fields
/// only; the id is not duplicated inside the body).
#[derive(Clone, Debug)]
pub struct StoredRecord {
    pub id: Uuid,
    pub revision: i64,
    pub body: Value,
}

impl StoredRecord {
    /// Body with the id merged in, as returned to API clients.
    pub fn to_json(&self) -> Value {
        let mut map = match &self.body {
            Value::Object(m) => m.clone(),
            _ => Map::new(),
        };
        map.insert("id".into(), Value::String(self.id.to_string()));
        Value::Object(map)
    }
}

/// An update staged by the coordinator: new body plus the revision the
/// pre-update snapshot was read at.
#[derive(Clone, Debug)]
pub struct RecordUpdate {
    pub kind: EntityKind,
    pub id: Uuid,
    pub expected_revision: i64,
    pub body: Value,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert one row; the store assigns the id. Declared unique groups are
    /// enforced atomically with the write, so two racing inserts cannot both
    /// land.
    async fn insert(&self, kind: EntityKind, body: Value) -> Result<StoredRecord, AppError>;

    async fn fetch(&self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRecord>, AppError>;

    async fn exists(&self, kind: EntityKind, id: Uuid) -> Result<bool, AppError>;

    /// List rows with exact-match field filters, limit and offset.
    async fn list(
        &self,
        kind: EntityKind,
        filters: &[(String, Value)],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredRecord>, AppError>;

    /// All rows whose body matches every (field, value) pair. Used for
    /// unique checks and the cascade walk.
    async fn find_by_fields(
        &self,
        kind: EntityKind,
        fields: &[(&str, Value)],
    ) -> Result<Vec<StoredRecord>, AppError>;

    /// Apply one update plus companion inserts in a single atomic commit.
    /// Fails with `ConcurrentModification` when the row's revision no longer
    /// matches `expected_revision`, or with `UniqueConstraintViolation` when
    /// the new body collides with another row; nothing is written in either
    /// case.
    async fn commit_update(
        &self,
        update: RecordUpdate,
        companions: Vec<(EntityKind, Value)>,
    ) -> Result<StoredRecord, AppError>;

    /// Delete one row and, transitively, every dependent row. Dependents are
    /// discovered inside the same atomic operation as the removal, so a row
    /// inserted concurrently cannot survive as an orphan. Returns the number
    /// removed; 0 means the root did not exist.
    async fn delete_cascade(
        &self,
        registry: &SchemaRegistry,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<u64, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

/// Filter equality: strict JSON equality plus cross-representation number
/// compare ("3" filters never match 3, but 3 and 3.0 do).
pub(crate) fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

pub(crate) fn matches_fields(body: &Value, fields: &[(&str, Value)]) -> bool {
    fields
        .iter()
        .all(|(name, want)| body.get(*name).is_some_and(|got| value_eq(got, want)))
}
