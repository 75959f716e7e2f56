//! Record and trash API routes.
//!
//! Thin axum glue: extract request parts, validate the collection name
//! and `since`/`type` query parameters, and delegate to the handler
//! functions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::handlers;
use crate::AppState;
use roadbook_core::{RecordType, Timestamp};

/// Create record and trash routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/trash", get(list_trash_handler))
        .route("/api/trash/{id}", post(restore_handler))
        .route("/api/trash/{id}", delete(purge_handler))
        .route("/api/{collection}", post(create_handler))
        .route("/api/{collection}", get(list_handler))
        .route("/api/{collection}/{id}", put(update_handler))
        .route("/api/{collection}/{id}", delete(delete_handler))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// ISO8601 watermark for delta sync
    since: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrashQuery {
    /// Record type of the trash entry
    #[serde(rename = "type")]
    record_type: Option<String>,
}

fn parse_collection(collection: &str) -> Result<RecordType> {
    RecordType::parse(collection)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown collection: {collection}")))
}

/// Accept the watermark as RFC 3339 or raw epoch milliseconds.
fn parse_since(since: &str) -> Result<Timestamp> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(since) {
        return Ok(parsed.timestamp_millis().max(0) as Timestamp);
    }
    since
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid since value: {since}")))
}

fn parse_trash_type(query: &TrashQuery) -> Result<Option<RecordType>> {
    match query.record_type.as_deref() {
        None => Ok(None),
        Some(value) => parse_collection(value).map(Some),
    }
}

/// POST /api/{collection} - create a record.
async fn create_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    auth: AuthUser,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    let kind = parse_collection(&collection)?;
    let record = handlers::create_record(&state, &auth.user_id, kind, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/{collection}/{id} - update a record.
async fn update_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    auth: AuthUser,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    let kind = parse_collection(&collection)?;
    let record = handlers::update_record(&state, &auth.user_id, kind, &id, body).await?;
    Ok(Json(record))
}

/// DELETE /api/{collection}/{id} - soft delete.
async fn delete_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let kind = parse_collection(&collection)?;
    handlers::delete_record(&state, &auth.user_id, kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/{collection}?since=ISO8601 - full or delta listing.
async fn list_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let kind = parse_collection(&collection)?;
    let since = query.since.as_deref().map(parse_since).transpose()?;
    let slots = handlers::list_records(&state, &auth.user_id, kind, since).await?;
    Ok(Json(slots))
}

/// GET /api/trash - merged trash listing.
async fn list_trash_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let summaries = handlers::list_trash(&state, &auth.user_id).await?;
    Ok(Json(summaries))
}

/// POST /api/trash/{id}?type={recordType} - restore from trash.
async fn restore_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TrashQuery>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let kind = parse_trash_type(&query)?;
    let record = handlers::restore_record(&state, &auth.user_id, &id, kind).await?;
    Ok(Json(record))
}

/// DELETE /api/trash/{id}?type={recordType} - purge, bypassing retention.
async fn purge_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TrashQuery>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let kind = parse_trash_type(&query)?
        .ok_or_else(|| AppError::BadRequest("type query parameter is required".to_string()))?;
    handlers::purge_record(&state, &auth.user_id, &id, kind).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_accepts_rfc3339_and_millis() {
        assert_eq!(parse_since("1706745600000").unwrap(), 1706745600000);
        assert_eq!(
            parse_since("2024-02-01T00:00:00Z").unwrap(),
            1706745600000
        );
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn unknown_collection_is_rejected() {
        assert!(parse_collection("trip").is_ok());
        assert!(parse_collection("trips").is_err());
    }
}
