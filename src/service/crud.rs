//! Generic CRUD execution: the transaction coordinator composing the
//! integrity enforcer, the request validator and the SOP audit hook over a
//! `Store`.

use crate::audit::{sop_version_change, SopSnapshot};
use crate::error::AppError;
use crate::integrity::{check_unique, subtype_warning, validate_foreign_keys};
use crate::schema::{EntityKind, FieldSpec, FieldType, SchemaRegistry};
use crate::service::RequestValidator;
use crate::store::{RecordUpdate, Store};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

pub struct ResourceService;

impl ResourceService {
    /// List rows with optional exact-match filters, limit (default 100,
    /// max 1000) and offset (default 0).
    pub async fn list(
        store: &dyn Store,
        kind: EntityKind,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, AppError> {
        const DEFAULT_LIMIT: u32 = 100;
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(1000);
        let offset = offset.unwrap_or(0);
        let rows = store.list(kind, filters, limit, offset).await?;
        Ok(rows.iter().map(|r| r.to_json()).collect())
    }

    /// Fetch one row. For samples, a missing or mismatched subtype detail
    /// row is reported as a warning alongside the data.
    pub async fn read(
        store: &dyn Store,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<(Value, Vec<String>)>, AppError> {
        let record = match store.fetch(kind, id).await? {
            Some(r) => r,
            None => return Ok(None),
        };
        let mut warnings = Vec::new();
        if kind == EntityKind::Sample {
            if let Some(warning) = subtype_warning(store, &record).await? {
                tracing::warn!(sample = %record.id, "{}", warning);
                warnings.push(warning);
            }
        }
        Ok(Some((record.to_json(), warnings)))
    }

    /// Insert one row: field validation, then foreign keys, then unique
    /// constraints; nothing is persisted unless every check passes.
    pub async fn create(
        registry: &SchemaRegistry,
        store: &dyn Store,
        kind: EntityKind,
        body: Value,
    ) -> Result<(Value, Vec<String>), AppError> {
        let spec = registry.spec(kind);
        let body = apply_defaults(spec.fields, body, kind)?;
        RequestValidator::validate(&body, spec)?;
        validate_foreign_keys(registry, store, kind, &body).await?;
        check_unique(registry, store, kind, &body, None).await?;

        let mut warnings = Vec::new();
        if kind.is_sample_detail() {
            if let Some(warning) = detail_mismatch(store, kind, &body).await? {
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
        }
        let record = store.insert(kind, body).await?;
        Ok((record.to_json(), warnings))
    }

    /// Partial update: the patch is merged over the persisted body, the
    /// merged state re-validated, and the commit carries the SOP audit row
    /// when the hook fires. The pre-update snapshot's revision guards
    /// against a concurrently committed writer.
    pub async fn update(
        registry: &SchemaRegistry,
        store: &dyn Store,
        kind: EntityKind,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<Value>, AppError> {
        let spec = registry.spec(kind);
        let old = match store.fetch(kind, id).await? {
            Some(r) => r,
            None => return Ok(None),
        };
        let merged = merge_patch(&old.body, patch)?;
        RequestValidator::validate(&merged, spec)?;
        validate_foreign_keys(registry, store, kind, &merged).await?;
        check_unique(registry, store, kind, &merged, Some(id)).await?;

        let mut companions = Vec::new();
        if kind == EntityKind::Sop {
            let before = SopSnapshot::from_body(&old.body)?;
            let after = SopSnapshot::from_body(&merged)?;
            if let Some(audit) = sop_version_change(id, &before, &after, Utc::now()) {
                tracing::debug!(sop = %id, "version change audited");
                companions.push(audit);
            }
        }
        let update = RecordUpdate {
            kind,
            id,
            expected_revision: old.revision,
            body: merged,
        };
        let record = store.commit_update(update, companions).await?;
        Ok(Some(record.to_json()))
    }

    /// Cascade delete: the store discovers the transitive dependents and
    /// removes them together with the root in one atomic operation.
    pub async fn delete(
        registry: &SchemaRegistry,
        store: &dyn Store,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let removed = store.delete_cascade(registry, kind, id).await?;
        Ok(removed > 0)
    }
}

/// Create-time defaults: booleans default to false; a sample's
/// time_received defaults to the write instant.
fn apply_defaults(
    fields: &'static [FieldSpec],
    body: Value,
    kind: EntityKind,
) -> Result<Value, AppError> {
    let mut map: Map<String, Value> = match body {
        Value::Object(m) => m,
        _ => return Err(AppError::BadRequest("body must be a JSON object".into())),
    };
    for field in fields {
        if matches!(field.field_type, FieldType::Bool) && !map.contains_key(field.name) {
            map.insert(field.name.to_string(), Value::Bool(false));
        }
    }
    if kind == EntityKind::Sample && !map.contains_key("time_received") {
        map.insert(
            "time_received".into(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
    Ok(Value::Object(map))
}

fn merge_patch(current: &Value, patch: Value) -> Result<Value, AppError> {
    let patch = match patch {
        Value::Object(m) => m,
        _ => return Err(AppError::BadRequest("body must be a JSON object".into())),
    };
    let mut merged = match current {
        Value::Object(m) => m.clone(),
        _ => Map::new(),
    };
    for (k, v) in patch {
        merged.insert(k, v);
    }
    Ok(Value::Object(merged))
}

/// A detail row whose parent sample's discriminator names another subtype.
async fn detail_mismatch(
    store: &dyn Store,
    kind: EntityKind,
    body: &Value,
) -> Result<Option<String>, AppError> {
    let sample_id = body
        .get("sample")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());
    let sample_id = match sample_id {
        Some(id) => id,
        None => return Ok(None),
    };
    let sample = match store.fetch(EntityKind::Sample, sample_id).await? {
        Some(r) => r,
        None => return Ok(None),
    };
    let sample_type = sample.body.get("sample_type").and_then(Value::as_str);
    match sample_type.and_then(EntityKind::detail_for_sample_type) {
        Some(expected) if expected != kind => Ok(Some(format!(
            "sample {} has sample_type {:?}; expected a {} detail row, got {}",
            sample_id,
            sample_type.unwrap_or(""),
            expected.name(),
            kind.name()
        ))),
        _ => Ok(None),
    }
}
