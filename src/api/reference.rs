//! Reference data endpoints
//!
//! Options for the submission form and the search filters:
//! - GET /api/categories
//! - GET /api/locations
//! - GET /api/tags

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Category, Location, Tag};

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<Tag>,
}

/// Build the reference data router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/locations", get(list_locations))
        .route("/tags", get(list_tags))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = state.listing_service.categories().await?;
    Ok(Json(CategoryListResponse { categories }))
}

async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<LocationListResponse>, ApiError> {
    let locations = state.listing_service.locations().await?;
    Ok(Json(LocationListResponse { locations }))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.listing_service.tags().await?;
    Ok(Json(TagListResponse { tags }))
}
