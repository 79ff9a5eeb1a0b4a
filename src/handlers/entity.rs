//! Entity CRUD handlers: create, read, update, delete, list. The path
//! segment selects the entity kind; ids are UUIDs.

use crate::error::AppError;
use crate::response::{warnings_meta, MetaCount, SuccessMany, SuccessOne};
use crate::schema::{EntityKind, FieldType};
use crate::service::ResourceService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

fn resolve_kind(state: &AppState, path_segment: &str, operation: &str) -> Result<EntityKind, AppError> {
    let kind = state
        .registry
        .kind_for_path(path_segment)
        .ok_or_else(|| AppError::NotFound(path_segment.to_string()))?;
    if !state.registry.allows(kind, operation) {
        return Err(AppError::BadRequest(format!("{} not allowed", operation)));
    }
    Ok(kind)
}

fn parse_id(id_str: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))
}

fn query_value_for_field(state: &AppState, kind: EntityKind, field: &str, s: &str) -> Value {
    let field_type = state.registry.field(kind, field).map(|f| f.field_type);
    match field_type {
        Some(FieldType::Bool) => {
            if s.eq_ignore_ascii_case("true") {
                return Value::Bool(true);
            }
            if s.eq_ignore_ascii_case("false") {
                return Value::Bool(false);
            }
        }
        Some(FieldType::Integer) => {
            if let Ok(n) = s.parse::<i64>() {
                return Value::Number(n.into());
            }
        }
        _ => {}
    }
    Value::String(s.to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let kind = resolve_kind(&state, &path_segment, "read")?;

    let mut limit: Option<u32> = None;
    let mut offset: Option<u32> = None;
    let mut filters: Vec<(String, Value)> = Vec::new();
    for (k, v) in params {
        match k.as_str() {
            "limit" => {
                limit = v.parse().ok();
            }
            "offset" => {
                offset = v.parse().ok();
            }
            _ => {
                if state.registry.field(kind, &k).is_some() {
                    let val = query_value_for_field(&state, kind, &k, &v);
                    filters.push((k, val));
                }
            }
        }
    }

    let rows = ResourceService::list(state.store.as_ref(), kind, &filters, limit, offset).await?;
    let count = rows.len() as u64;
    Ok((
        axum::http::StatusCode::OK,
        Json(SuccessMany {
            data: rows,
            meta: MetaCount { count },
        }),
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let kind = resolve_kind(&state, &path_segment, "create")?;
    let (row, warnings) =
        ResourceService::create(&state.registry, state.store.as_ref(), kind, body).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(SuccessOne {
            data: row,
            meta: warnings_meta(&warnings),
        }),
    ))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let kind = resolve_kind(&state, &path_segment, "read")?;
    let id = parse_id(&id_str)?;
    let (row, warnings) = ResourceService::read(state.store.as_ref(), kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(id_str))?;
    Ok((
        axum::http::StatusCode::OK,
        Json(SuccessOne {
            data: row,
            meta: warnings_meta(&warnings),
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let kind = resolve_kind(&state, &path_segment, "update")?;
    let id = parse_id(&id_str)?;
    let row = ResourceService::update(&state.registry, state.store.as_ref(), kind, id, body)
        .await?
        .ok_or_else(|| AppError::NotFound(id_str))?;
    Ok((
        axum::http::StatusCode::OK,
        Json(SuccessOne { data: row, meta: None }),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let kind = resolve_kind(&state, &path_segment, "delete")?;
    let id = parse_id(&id_str)?;
    if !ResourceService::delete(&state.registry, state.store.as_ref(), kind, id).await? {
        return Err(AppError::NotFound(id_str));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}
