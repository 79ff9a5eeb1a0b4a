//! Referential integrity enforcer: foreign-key validation, unique
//! constraints and the sample-subtype check. Checks run before anything is
//! written; the stores back them with their own atomic enforcement (unique
//! indexes, in-transaction cascade discovery).

use crate::error::{AppError, IntegrityError};
use crate::schema::{EntityKind, SchemaRegistry};
use crate::store::{Store, StoredRecord};
use serde_json::Value;
use uuid::Uuid;

/// Every foreign-key field present in `body` must reference a live row of
/// its target kind. Absent optional references pass; a dangling one fails
/// with `ForeignKeyViolation` naming the field and target entity.
pub async fn validate_foreign_keys(
    registry: &SchemaRegistry,
    store: &dyn Store,
    kind: EntityKind,
    body: &Value,
) -> Result<(), AppError> {
    for rel in registry.references(kind) {
        let value = match body.get(rel.field) {
            None | Some(Value::Null) => continue,
            Some(v) => v,
        };
        let id = value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AppError::Validation(format!("{} must be a UUID reference", rel.field))
            })?;
        if !store.exists(rel.target, id).await? {
            return Err(IntegrityError::ForeignKeyViolation {
                field: rel.field.to_string(),
                target: rel.target.name(),
            }
            .into());
        }
    }
    Ok(())
}

/// Declared unique groups (single and composite) must not collide with any
/// other row. `exclude` skips the row being updated.
pub async fn check_unique(
    registry: &SchemaRegistry,
    store: &dyn Store,
    kind: EntityKind,
    body: &Value,
    exclude: Option<Uuid>,
) -> Result<(), AppError> {
    for group in registry.uniques(kind) {
        let mut lookup: Vec<(&str, Value)> = Vec::with_capacity(group.len());
        for field in *group {
            match body.get(*field) {
                None | Some(Value::Null) => {
                    lookup.clear();
                    break;
                }
                Some(v) => lookup.push((field, v.clone())),
            }
        }
        if lookup.is_empty() {
            continue;
        }
        let hits = store.find_by_fields(kind, &lookup).await?;
        if hits.iter().any(|r| Some(r.id) != exclude) {
            return Err(IntegrityError::UniqueConstraintViolation {
                entity: kind.name(),
                fields: group.join(", "),
            }
            .into());
        }
    }
    Ok(())
}

/// Sample subtype check: exactly one detail row of the kind named by
/// `sample_type` should exist. Existing data has gaps, so a gap is reported
/// as a warning, not an error.
pub async fn subtype_warning(
    store: &dyn Store,
    sample: &StoredRecord,
) -> Result<Option<String>, AppError> {
    let sample_type = match sample.body.get("sample_type").and_then(Value::as_str) {
        Some(t) => t,
        None => return Ok(None),
    };
    let expected = match EntityKind::detail_for_sample_type(sample_type) {
        Some(kind) => kind,
        None => return Ok(None),
    };
    let key = Value::String(sample.id.to_string());
    for detail in [
        EntityKind::InProcess,
        EntityKind::Stability,
        EntityKind::FinishedProduct,
    ] {
        let rows = store
            .find_by_fields(detail, &[("sample", key.clone())])
            .await?;
        if !rows.is_empty() && detail != expected {
            return Ok(Some(format!(
                "sample {} has a {} detail row but sample_type {:?} expects {}",
                sample.id,
                detail.name(),
                sample_type,
                expected.name()
            )));
        }
        if detail == expected && rows.is_empty() {
            let warning = IntegrityError::MissingSubtypeDetail {
                id: sample.id,
                expected: expected.name(),
            };
            return Ok(Some(warning.to_string()));
        }
    }
    Ok(None)
}
