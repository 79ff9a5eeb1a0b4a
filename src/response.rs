//! Standard response envelope helpers.

use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Meta carrying non-fatal warnings (e.g. a sample missing its subtype
/// detail row); None when there are none.
pub fn warnings_meta(warnings: &[String]) -> Option<serde_json::Value> {
    if warnings.is_empty() {
        None
    } else {
        Some(serde_json::json!({ "warnings": warnings }))
    }
}
