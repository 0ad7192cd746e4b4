//! Admin API endpoints
//!
//! Moderation endpoints, all behind the session gate:
//! - GET /api/admin/listings - Moderation table
//! - PATCH /api/admin/listings/{id} - Apply a moderation action
//! - GET /api/admin/listings/{id}/events - Moderation audit trail

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::listings::{page_params, ListingListResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedAdmin};
use crate::models::{Listing, ListingStatus, ModerationAction, ModerationEvent};

/// Query parameters for the moderation table
#[derive(Debug, Default, Deserialize)]
pub struct ModerationQuery {
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Request body for a moderation action
#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct ModerationResponse {
    pub success: bool,
    pub listing: Listing,
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<ModerationEvent>,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings))
        .route("/listings/{id}", axum::routing::patch(moderate_listing))
        .route("/listings/{id}/events", get(list_events))
}

fn parse_status(raw: Option<&str>) -> Result<Option<ListingStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(s) => ListingStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::field_error("status", format!("Unknown status '{}'", s))),
    }
}

/// Listing id from the path, rejected inside the JSON error envelope
fn listing_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::field_error("id", e.body_text()))
}

/// GET /api/admin/listings - Moderation table, newest first
async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ModerationQuery>,
) -> Result<Json<ListingListResponse>, ApiError> {
    let status = parse_status(query.status.as_deref())?;
    let page = page_params(query.limit.as_deref(), query.offset.as_deref());

    let result = state
        .listing_service
        .list_for_moderation(status, page)
        .await?;
    Ok(Json(result.into()))
}

/// PATCH /api/admin/listings/{id} - Apply a moderation action
async fn moderate_listing(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ModerationRequest>, JsonRejection>,
) -> Result<Json<ModerationResponse>, ApiError> {
    let id = listing_id(path)?;
    let Json(body) = body.map_err(|e| ApiError::validation_error(e.body_text()))?;
    let action = ModerationAction::parse(&body.action).ok_or_else(|| {
        ApiError::field_error("action", format!("Unknown action '{}'", body.action))
    })?;

    let listing = state
        .moderation_service
        .apply(id, action, &admin.0.principal)
        .await?;

    Ok(Json(ModerationResponse {
        success: true,
        listing,
    }))
}

/// GET /api/admin/listings/{id}/events - Audit trail, oldest first
async fn list_events(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<EventListResponse>, ApiError> {
    let id = listing_id(path)?;
    let events = state.moderation_service.events(id).await?;
    Ok(Json(EventListResponse { events }))
}
