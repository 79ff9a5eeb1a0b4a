//! SOP version audit: a pure pre-update hook. The coordinator feeds it the
//! persisted snapshot and the incoming state; when the versioned fields
//! changed it returns the VersionChange record to insert atomically with the
//! SOP update. Creates never fire it, and identical resubmissions each
//! produce their own audit row.

use crate::error::AppError;
use crate::schema::EntityKind;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;

/// The audited slice of an SOP row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SopSnapshot {
    pub version_number: Decimal,
    pub effective_date: NaiveDate,
}

impl SopSnapshot {
    /// Parse from a stored/incoming SOP body. `version_number` may arrive as
    /// a JSON string ("1.0") or number; both keep exact decimal semantics.
    pub fn from_body(body: &Value) -> Result<Self, AppError> {
        let version_number = parse_decimal(body.get("version_number"), "version_number")?;
        let effective_date = parse_date(body.get("effective_date"), "effective_date")?;
        Ok(SopSnapshot {
            version_number,
            effective_date,
        })
    }
}

pub(crate) fn parse_decimal(v: Option<&Value>, field: &str) -> Result<Decimal, AppError> {
    match v {
        Some(Value::String(s)) => Decimal::from_str(s)
            .map_err(|_| AppError::Validation(format!("{} is not a valid decimal", field))),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map_err(|_| AppError::Validation(format!("{} is not a valid decimal", field))),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}

pub(crate) fn parse_date(v: Option<&Value>, field: &str) -> Result<NaiveDate, AppError> {
    match v {
        Some(Value::String(s)) => NaiveDate::from_str(s)
            .map_err(|_| AppError::Validation(format!("{} must be a YYYY-MM-DD date", field))),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}

/// Fires iff the version number or the effective date changed between the
/// two snapshots. Any other field change (e.g. sop_name) is not audited.
/// Returns the VersionChange body ready for insertion.
pub fn sop_version_change(
    sop_id: Uuid,
    old: &SopSnapshot,
    new: &SopSnapshot,
    now: DateTime<Utc>,
) -> Option<(EntityKind, Value)> {
    if old.version_number == new.version_number && old.effective_date == new.effective_date {
        return None;
    }
    let body = json!({
        "old_version_number": old.version_number.to_string(),
        "new_version_number": new.version_number.to_string(),
        "old_effective_date": old.effective_date.to_string(),
        "new_effective_date": new.effective_date.to_string(),
        "sop": sop_id.to_string(),
        "change_date": now.date_naive().to_string(),
    });
    Some((EntityKind::VersionChange, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(version: &str, date: &str) -> SopSnapshot {
        SopSnapshot {
            version_number: Decimal::from_str(version).unwrap(),
            effective_date: NaiveDate::from_str(date).unwrap(),
        }
    }

    #[test]
    fn fires_on_version_bump() {
        let sop = Uuid::new_v4();
        let old = snapshot("1.0", "2024-01-01");
        let new = snapshot("1.1", "2024-01-01");
        let (kind, body) = sop_version_change(sop, &old, &new, Utc::now()).unwrap();
        assert_eq!(kind, EntityKind::VersionChange);
        assert_eq!(body["old_version_number"], "1.0");
        assert_eq!(body["new_version_number"], "1.1");
        assert_eq!(body["old_effective_date"], body["new_effective_date"]);
        assert_eq!(body["sop"], sop.to_string());
    }

    #[test]
    fn fires_on_date_change_alone() {
        let old = snapshot("2.0", "2024-01-01");
        let new = snapshot("2.0", "2024-06-01");
        assert!(sop_version_change(Uuid::new_v4(), &old, &new, Utc::now()).is_some());
    }

    #[test]
    fn silent_when_audited_fields_unchanged() {
        let old = snapshot("1.0", "2024-01-01");
        assert!(sop_version_change(Uuid::new_v4(), &old, &old.clone(), Utc::now()).is_none());
    }

    #[test]
    fn trailing_zeroes_compare_numerically() {
        // 1.0 vs 1.00 is not a version change.
        let old = snapshot("1.0", "2024-01-01");
        let new = snapshot("1.00", "2024-01-01");
        assert!(sop_version_change(Uuid::new_v4(), &old, &new, Utc::now()).is_none());
    }

    #[test]
    fn change_date_is_write_time() {
        let old = snapshot("1.0", "2024-01-01");
        let new = snapshot("1.1", "2024-01-01");
        let now = "2025-03-04T12:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let (_, body) = sop_version_change(Uuid::new_v4(), &old, &new, now).unwrap();
        assert_eq!(body["change_date"], "2025-03-04");
    }

    #[test]
    fn snapshot_parses_string_and_number_versions() {
        let a = SopSnapshot::from_body(&json!({
            "version_number": "1.5", "effective_date": "2024-02-02"
        }))
        .unwrap();
        let b = SopSnapshot::from_body(&json!({
            "version_number": 1.5, "effective_date": "2024-02-02"
        }))
        .unwrap();
        assert_eq!(a, b);
    }
}
