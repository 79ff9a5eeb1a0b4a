//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Consistency violations detected before any write is committed. A failed
/// check aborts the whole operation; no partial cascade or audit record is
/// ever left behind.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("foreign key violation: {field} references a missing {target} row")]
    ForeignKeyViolation {
        field: String,
        target: &'static str,
    },
    #[error("unique constraint violation: {entity} ({fields}) already exists")]
    UniqueConstraintViolation {
        entity: &'static str,
        fields: String,
    },
    #[error("sample {id} has no matching {expected} detail row")]
    MissingSubtypeDetail { id: Uuid, expected: &'static str },
    #[error("concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: Uuid },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Integrity(e) => match e {
                IntegrityError::ForeignKeyViolation { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "foreign_key_violation")
                }
                IntegrityError::UniqueConstraintViolation { .. } => {
                    (StatusCode::CONFLICT, "unique_constraint_violation")
                }
                IntegrityError::MissingSubtypeDetail { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "missing_subtype_detail")
                }
                IntegrityError::ConcurrentModification { .. } => {
                    (StatusCode::CONFLICT, "concurrent_modification")
                }
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
