//! PostgreSQL store: one JSONB payload table per entity kind, all under a
//! schema named from `LIMS_SCHEMA` env (default `lims`). Rows carry a
//! revision used for the optimistic pre-update check; declared unique groups
//! are backed by unique expression indexes so racing writers cannot both
//! commit a colliding row.

use super::{RecordUpdate, Store, StoredRecord};
use crate::error::{AppError, IntegrityError};
use crate::schema::lims::SPECS;
use crate::schema::{EntityKind, FieldType, SchemaRegistry};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{ConnectOptions, PgPool, Row as _};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// Schema name for entity tables. Always interpolated through
/// `quote_ident`, so any value is confined to the identifier position.
pub fn lims_schema() -> String {
    std::env::var("LIMS_SCHEMA").unwrap_or_else(|_| "lims".into())
}

fn qualified_table(kind: EntityKind) -> String {
    format!("{}.{}", quote_ident(&lims_schema()), kind.table_name())
}

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Translate a unique-index rejection into the typed integrity error;
/// everything else stays a database error.
fn map_constraint(kind: EntityKind, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return IntegrityError::UniqueConstraintViolation {
                entity: kind.name(),
                fields: db.constraint().unwrap_or("unique index").to_string(),
            }
            .into();
        }
    }
    AppError::Db(err)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Create the schema, one payload table per entity kind, a unique
    /// expression index per declared unique group and a plain index per
    /// reference column (the cascade walk filters on them). Idempotent.
    pub async fn ensure_tables(&self) -> Result<(), AppError> {
        let schema = lims_schema();
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(&schema)
        ))
        .execute(&self.pool)
        .await?;
        for spec in SPECS {
            let table = qualified_table(spec.kind);
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY,
                    revision BIGINT NOT NULL DEFAULT 1,
                    payload JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                table
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
            for group in spec.uniques {
                let columns: Vec<String> = group
                    .iter()
                    .map(|f| format!("(payload->>'{}')", f))
                    .collect();
                let index = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {}_{}_key ON {} ({})",
                    spec.kind.table_name(),
                    group.join("_"),
                    table,
                    columns.join(", ")
                );
                sqlx::query(&index).execute(&self.pool).await?;
            }
            for field in spec.fields {
                if let FieldType::Reference(_) = field.field_type {
                    let index = format!(
                        "CREATE INDEX IF NOT EXISTS {}_{}_idx ON {} ((payload->>'{}'))",
                        spec.kind.table_name(),
                        field.name,
                        table,
                        field.name
                    );
                    sqlx::query(&index).execute(&self.pool).await?;
                }
            }
        }
        Ok(())
    }
}

fn containment_object(fields: &[(&str, Value)]) -> Value {
    let mut m = serde_json::Map::new();
    for (name, v) in fields {
        m.insert((*name).to_string(), v.clone());
    }
    Value::Object(m)
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> StoredRecord {
    StoredRecord {
        id: row.get("id"),
        revision: row.get("revision"),
        body: row.get("payload"),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert(&self, kind: EntityKind, body: Value) -> Result<StoredRecord, AppError> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO {} (id, revision, payload) VALUES ($1, 1, $2)",
            qualified_table(kind)
        );
        tracing::debug!(sql = %sql, kind = kind.name(), %id, "insert");
        sqlx::query(&sql)
            .bind(id)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(|e| map_constraint(kind, e))?;
        Ok(StoredRecord { id, revision: 1, body })
    }

    async fn fetch(&self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRecord>, AppError> {
        let sql = format!(
            "SELECT id, revision, payload FROM {} WHERE id = $1",
            qualified_table(kind)
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn exists(&self, kind: EntityKind, id: Uuid) -> Result<bool, AppError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            qualified_table(kind)
        );
        let row: (bool,) = sqlx::query_as(&sql).bind(id).fetch_one(&self.pool).await?;
        Ok(row.0)
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
        let sql = format!(
            "SELECT id, revision, payload FROM {} WHERE payload @> $1 ORDER BY id LIMIT $2 OFFSET $3",
            qualified_table(kind)
        );
        tracing::debug!(sql = %sql, kind = kind.name(), "list");
        let rows = sqlx::query(&sql)
            .bind(containment_object(&borrowed))
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn find_by_fields(
        &self,
        kind: EntityKind,
        fields: &[(&str, Value)],
    ) -> Result<Vec<StoredRecord>, AppError> {
        let sql = format!(
            "SELECT id, revision, payload FROM {} WHERE payload @> $1",
            qualified_table(kind)
        );
        let rows = sqlx::query(&sql)
            .bind(containment_object(fields))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn commit_update(
        &self,
        update: RecordUpdate,
        companions: Vec<(EntityKind, Value)>,
    ) -> Result<StoredRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE {} SET payload = $1, revision = revision + 1, updated_at = NOW() \
             WHERE id = $2 AND revision = $3 RETURNING revision",
            qualified_table(update.kind)
        );
        tracing::debug!(sql = %sql, kind = update.kind.name(), id = %update.id, "update");
        let row = sqlx::query(&sql)
            .bind(&update.body)
            .bind(update.id)
            .bind(update.expected_revision)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_constraint(update.kind, e))?;
        let revision: i64 = match row {
            Some(r) => r.get("revision"),
            None => {
                // Distinguish a vanished row from a revision mismatch.
                let exists_sql = format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
                    qualified_table(update.kind)
                );
                let (exists,): (bool,) = sqlx::query_as(&exists_sql)
                    .bind(update.id)
                    .fetch_one(&mut *tx)
                    .await?;
                tx.rollback().await?;
                return Err(if exists {
                    IntegrityError::ConcurrentModification {
                        entity: update.kind.name(),
                        id: update.id,
                    }
                    .into()
                } else {
                    AppError::NotFound(format!("{} {}", update.kind.name(), update.id))
                });
            }
        };
        for (kind, body) in companions {
            let insert_sql = format!(
                "INSERT INTO {} (id, revision, payload) VALUES ($1, 1, $2)",
                qualified_table(kind)
            );
            sqlx::query(&insert_sql)
                .bind(Uuid::new_v4())
                .bind(&body)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_constraint(kind, e))?;
        }
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        let root_sql = format!(
            "SELECT 1 FROM {} WHERE id = $1 FOR UPDATE",
            qualified_table(kind)
        );
        if sqlx::query(&root_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_none()
        {
            tx.rollback().await?;
            return Ok(0);
        }
        // The dependent walk runs inside the delete transaction, locking
        // each discovered row, so the removal covers everything visible at
        // commit time.
        let mut plan = vec![(kind, id)];
        let mut seen: HashSet<(EntityKind, Uuid)> = plan.iter().copied().collect();
        let mut cursor = 0;
        while cursor < plan.len() {
            let (current, current_id) = plan[cursor];
            cursor += 1;
            for rel in registry.dependents(current) {
                let sql = format!(
                    "SELECT id FROM {} WHERE payload @> $1 FOR UPDATE",
                    qualified_table(rel.kind)
                );
                let lookup = containment_object(&[(
                    rel.field,
                    Value::String(current_id.to_string()),
                )]);
                let rows = sqlx::query(&sql).bind(lookup).fetch_all(&mut *tx).await?;
                for row in rows {
                    let dep_id: Uuid = row.get("id");
                    if seen.insert((rel.kind, dep_id)) {
                        plan.push((rel.kind, dep_id));
                    }
                }
            }
        }
        let mut removed = 0u64;
        for (target_kind, target_id) in &plan {
            let sql = format!(
                "DELETE FROM {} WHERE id = $1",
                qualified_table(*target_kind)
            );
            removed += sqlx::query(&sql)
                .bind(target_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        tracing::debug!(kind = kind.name(), %id, removed, "cascade delete");
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects
/// to the default `postgres` database to run CREATE DATABASE. Call before
/// creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url);
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        let quoted = quote_ident(&db_name);
        sqlx::query(&format!("CREATE DATABASE {}", quoted))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

/// Split a connection URL into the admin URL (same authority, `postgres`
/// database) and the database name. The path is located after the `://`
/// authority, never inside it; a URL with no path yields an empty name.
fn parse_db_name_from_url(url: &str) -> (String, String) {
    let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    let rest = url.get(authority_start..).unwrap_or("");
    let slash = match rest.find('/') {
        Some(i) => i,
        None => return (url.to_string(), String::new()),
    };
    let path_start = authority_start + slash + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    (format!("{}postgres", base), db_name.to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_name_from_full_url() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/lims");
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "lims");
    }

    #[test]
    fn db_name_strips_query_string() {
        let (admin, db) = parse_db_name_from_url("postgres://localhost/lims?sslmode=disable");
        assert_eq!(admin, "postgres://localhost/postgres");
        assert_eq!(db, "lims");
    }

    #[test]
    fn url_without_database_path() {
        // The authority must not be mistaken for a database name.
        let (admin, db) = parse_db_name_from_url("postgres://localhost");
        assert_eq!(admin, "postgres://localhost");
        assert_eq!(db, "");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("lims"), "\"lims\"");
        assert_eq!(quote_ident("od\"d"), "\"od\"\"d\"");
        assert_eq!(quote_ident("lims; DROP SCHEMA x"), "\"lims; DROP SCHEMA x\"");
    }
}
