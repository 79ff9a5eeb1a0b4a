//! In-memory store for tests and demos. One lock over all tables: writers
//! are fully serialized, so every multi-row operation (cascade delete,
//! update + audit insert, unique check + insert) is trivially atomic.

use super::{matches_fields, RecordUpdate, Store, StoredRecord};
use crate::error::{AppError, IntegrityError};
use crate::schema::{EntityKind, SchemaRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Row {
    revision: i64,
    body: Value,
}

type Tables = HashMap<EntityKind, BTreeMap<Uuid, Row>>;

#[derive(Default)]
pub struct MemoryStore {
    registry: SchemaRegistry,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total row count for one kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.read_lock()
            .get(&kind)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Unique-group check against the locked tables. Runs under the same
    /// write lock as the insert/update it guards, so no second writer can
    /// slip a colliding row in between.
    fn check_uniques(
        &self,
        tables: &Tables,
        kind: EntityKind,
        body: &Value,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError> {
        for group in self.registry.uniques(kind) {
            let mut lookup: Vec<(&str, &Value)> = Vec::with_capacity(group.len());
            for field in *group {
                match body.get(*field) {
                    None | Some(Value::Null) => {
                        lookup.clear();
                        break;
                    }
                    Some(v) => lookup.push((field, v)),
                }
            }
            if lookup.is_empty() {
                continue;
            }
            let table = match tables.get(&kind) {
                Some(t) => t,
                None => continue,
            };
            let collides = table.iter().any(|(row_id, row)| {
                Some(*row_id) != exclude
                    && lookup.iter().all(|(f, v)| row.body.get(*f) == Some(*v))
            });
            if collides {
                return Err(IntegrityError::UniqueConstraintViolation {
                    entity: kind.name(),
                    fields: group.join(", "),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, kind: EntityKind, body: Value) -> Result<StoredRecord, AppError> {
        let id = Uuid::new_v4();
        let mut tables = self.write_lock();
        self.check_uniques(&tables, kind, &body, None)?;
        tables
            .entry(kind)
            .or_default()
            .insert(id, Row { revision: 1, body: body.clone() });
        tracing::debug!(kind = kind.name(), %id, "insert");
        Ok(StoredRecord { id, revision: 1, body })
    }

    async fn fetch(&self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRecord>, AppError> {
        let tables = self.read_lock();
        Ok(tables.get(&kind).and_then(|t| t.get(&id)).map(|row| StoredRecord {
            id,
            revision: row.revision,
            body: row.body.clone(),
        }))
    }

    async fn exists(&self, kind: EntityKind, id: Uuid) -> Result<bool, AppError> {
        let tables = self.read_lock();
        Ok(tables.get(&kind).is_some_and(|t| t.contains_key(&id)))
    }

    async fn list(
        &self,
        kind: EntityKind,
        filters: &[(String, Value)],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredRecord>, AppError> {
        let borrowed: Vec<(&str, Value)> = filters
            .iter()
            .map(|(name, v)| (name.as_str(), v.clone()))
            .collect();
        let tables = self.read_lock();
        let rows = tables
            .get(&kind)
            .map(|t| {
                t.iter()
                    .filter(|(_, row)| matches_fields(&row.body, &borrowed))
                    .skip(offset as usize)
                    .take(limit as usize)
                    .map(|(id, row)| StoredRecord {
                        id: *id,
                        revision: row.revision,
                        body: row.body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn find_by_fields(
        &self,
        kind: EntityKind,
        fields: &[(&str, Value)],
    ) -> Result<Vec<StoredRecord>, AppError> {
        let tables = self.read_lock();
        let rows = tables
            .get(&kind)
            .map(|t| {
                t.iter()
                    .filter(|(_, row)| matches_fields(&row.body, fields))
                    .map(|(id, row)| StoredRecord {
                        id: *id,
                        revision: row.revision,
                        body: row.body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn commit_update(
        &self,
        update: RecordUpdate,
        companions: Vec<(EntityKind, Value)>,
    ) -> Result<StoredRecord, AppError> {
        let mut tables = self.write_lock();
        let current_revision = tables
            .get(&update.kind)
            .and_then(|t| t.get(&update.id))
            .map(|row| row.revision)
            .ok_or_else(|| AppError::NotFound(format!("{} {}", update.kind.name(), update.id)))?;
        if current_revision != update.expected_revision {
            return Err(IntegrityError::ConcurrentModification {
                entity: update.kind.name(),
                id: update.id,
            }
            .into());
        }
        self.check_uniques(&tables, update.kind, &update.body, Some(update.id))?;
        let row = tables
            .get_mut(&update.kind)
            .and_then(|t| t.get_mut(&update.id))
            .ok_or_else(|| AppError::NotFound(format!("{} {}", update.kind.name(), update.id)))?;
        row.revision += 1;
        row.body = update.body.clone();
        let revision = row.revision;
        for (kind, body) in companions {
            let id = Uuid::new_v4();
            tables.entry(kind).or_default().insert(id, Row { revision: 1, body });
            tracing::debug!(kind = kind.name(), %id, "companion insert");
        }
        tracing::debug!(kind = update.kind.name(), id = %update.id, revision, "update");
        Ok(StoredRecord {
            id: update.id,
            revision,
            body: update.body,
        })
    }

    async fn delete_cascade(
        &self,
        registry: &SchemaRegistry,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<u64, AppError> {
        let mut tables = self.write_lock();
        if !tables.get(&kind).is_some_and(|t| t.contains_key(&id)) {
            return Ok(0);
        }
        // Walk the reverse relation graph under the write lock; nothing can
        // be inserted between discovery and removal.
        let mut plan = vec![(kind, id)];
        let mut seen: HashSet<(EntityKind, Uuid)> = plan.iter().copied().collect();
        let mut cursor = 0;
        while cursor < plan.len() {
            let (current, current_id) = plan[cursor];
            cursor += 1;
            for rel in registry.dependents(current) {
                let key = Value::String(current_id.to_string());
                if let Some(table) = tables.get(&rel.kind) {
                    for (dep_id, row) in table {
                        if row.body.get(rel.field) == Some(&key)
                            && seen.insert((rel.kind, *dep_id))
                        {
                            plan.push((rel.kind, *dep_id));
                        }
                    }
                }
            }
        }
        let mut removed = 0u64;
        for (target_kind, target_id) in plan {
            if tables
                .get_mut(&target_kind)
                .and_then(|t| t.remove(&target_id))
                .is_some()
            {
                removed += 1;
            }
        }
        tracing::debug!(kind = kind.name(), %id, removed, "cascade delete");
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
