//! Request validation against the entity field specs.

use crate::audit::{parse_date, parse_decimal};
use crate::error::AppError;
use crate::schema::{EntitySpec, FieldSpec, FieldType};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::str::FromStr;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full body against an entity spec: unknown fields are
    /// rejected, required fields must be present and non-null, and every
    /// present value must satisfy its field's type and rules.
    pub fn validate(body: &Value, spec: &EntitySpec) -> Result<(), AppError> {
        let map = body
            .as_object()
            .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()))?;
        for key in map.keys() {
            if !spec.fields.iter().any(|f| f.name == key.as_str()) {
                return Err(AppError::Validation(format!(
                    "unknown field {} for {}",
                    key,
                    spec.kind.name()
                )));
            }
        }
        for field in spec.fields {
            let val = map.get(field.name);
            if field.required && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", field.name)));
            }
            if let Some(v) = val {
                if !v.is_null() {
                    validate_field(field, v)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_field(field: &FieldSpec, v: &Value) -> Result<(), AppError> {
    match field.field_type {
        FieldType::Text => {
            let s = v
                .as_str()
                .ok_or_else(|| AppError::Validation(format!("{} must be a string", field.name)))?;
            if let Some(max) = field.max_length {
                if s.len() > max as usize {
                    return Err(AppError::Validation(format!(
                        "{} must be at most {} characters",
                        field.name, max
                    )));
                }
            }
            if let Some(format) = field.format {
                validate_format(field.name, s, format)?;
            }
            if let Some(pattern) = field.pattern {
                let re = Regex::new(pattern)
                    .map_err(|_| AppError::Validation(format!("invalid pattern for {}", field.name)))?;
                if !re.is_match(s) {
                    return Err(AppError::Validation(format!(
                        "{} does not match required pattern",
                        field.name
                    )));
                }
            }
            if let Some(allowed) = field.allowed {
                if !allowed.contains(&s) {
                    return Err(AppError::Validation(format!(
                        "{} must be one of: {:?}",
                        field.name, allowed
                    )));
                }
            }
        }
        FieldType::Bool => {
            if !v.is_boolean() {
                return Err(AppError::Validation(format!("{} must be a boolean", field.name)));
            }
        }
        FieldType::Integer => {
            if v.as_i64().is_none() {
                return Err(AppError::Validation(format!("{} must be an integer", field.name)));
            }
        }
        FieldType::Decimal => {
            parse_decimal(Some(v), field.name)?;
        }
        FieldType::Date => {
            parse_date(Some(v), field.name)?;
        }
        FieldType::DateTime => {
            let s = v.as_str().ok_or_else(|| {
                AppError::Validation(format!("{} must be an RFC 3339 timestamp", field.name))
            })?;
            DateTime::<Utc>::from_str(s).map_err(|_| {
                AppError::Validation(format!("{} must be an RFC 3339 timestamp", field.name))
            })?;
        }
        FieldType::Reference(_) => {
            let s = v
                .as_str()
                .ok_or_else(|| AppError::Validation(format!("{} must be a UUID", field.name)))?;
            uuid::Uuid::parse_str(s)
                .map_err(|_| AppError::Validation(format!("{} must be a UUID", field.name)))?;
        }
    }
    Ok(())
}

fn validate_format(name: &str, s: &str, format: &str) -> Result<(), AppError> {
    match format {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                return Err(AppError::Validation(format!("{} must be a valid email", name)));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityKind, SchemaRegistry};
    use serde_json::json;

    fn spec(kind: EntityKind) -> &'static EntitySpec {
        SchemaRegistry::new().spec(kind)
    }

    #[test]
    fn accepts_valid_sop() {
        let body = json!({
            "sop_name": "SOP-001",
            "version_number": "1.0",
            "effective_date": "2024-01-01"
        });
        RequestValidator::validate(&body, spec(EntityKind::Sop)).unwrap();
    }

    #[test]
    fn rejects_missing_required_field() {
        let body = json!({ "sop_name": "SOP-001", "version_number": "1.0" });
        let err = RequestValidator::validate(&body, spec(EntityKind::Sop)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_unknown_field() {
        let body = json!({
            "sop_name": "SOP-001",
            "version_number": "1.0",
            "effective_date": "2024-01-01",
            "surprise": true
        });
        assert!(RequestValidator::validate(&body, spec(EntityKind::Sop)).is_err());
    }

    #[test]
    fn rejects_bad_sample_type() {
        let body = json!({
            "location": uuid::Uuid::new_v4().to_string(),
            "warehouse": uuid::Uuid::new_v4().to_string(),
            "sop": uuid::Uuid::new_v4().to_string(),
            "product_name": "Aspirin",
            "product_stage": "granulation",
            "quantity": "10",
            "sample_type": "X",
            "storage_conditions": "2-8C"
        });
        let err = RequestValidator::validate(&body, spec(EntityKind::Sample)).unwrap_err();
        assert!(err.to_string().contains("sample_type"));
    }

    #[test]
    fn cas_number_pattern() {
        let mut body = json!({
            "sop": uuid::Uuid::new_v4().to_string(),
            "reagent_name": "Acetonitrile",
            "cas_number": "75-05-8",
            "lot_number": "L-1",
            "vendor": "Sigma",
            "manufacturing_date": "2024-01-01",
            "expiration_date": "2026-01-01"
        });
        RequestValidator::validate(&body, spec(EntityKind::Reagent)).unwrap();
        body["cas_number"] = json!("not-a-cas");
        assert!(RequestValidator::validate(&body, spec(EntityKind::Reagent)).is_err());
    }

    #[test]
    fn expiration_before_manufacturing_is_tolerated() {
        // Date ordering is deliberately not checked.
        let body = json!({
            "sop": uuid::Uuid::new_v4().to_string(),
            "reagent_name": "Methanol",
            "cas_number": "67-56-1",
            "lot_number": "L-2",
            "vendor": "Merck",
            "manufacturing_date": "2026-01-01",
            "expiration_date": "2024-01-01"
        });
        RequestValidator::validate(&body, spec(EntityKind::Reagent)).unwrap();
    }

    #[test]
    fn email_format() {
        let body = json!({
            "account_username": "jdoe",
            "first_name": "J",
            "last_name": "Doe",
            "phone": "555-0100",
            "email": "not-an-email",
            "department": "QC"
        });
        assert!(RequestValidator::validate(&body, spec(EntityKind::UserAccount)).is_err());
    }
}
