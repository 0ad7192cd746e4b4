//! Listing API endpoints
//!
//! Handles HTTP requests for the public directory:
//! - GET /api/listings - Search approved listings
//! - POST /api/listings - Submit a listing for moderation
//! - GET /api/listings/{slug} - Approved listing detail

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{ListingDetail, ListingQuery, ListingStatus, PageParams, PagedResult};
use crate::services::listing::SubmitListingInput;

/// Query parameters for listing search.
///
/// Numbers are parsed leniently; garbage falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub featured: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

impl SearchQuery {
    fn into_query(self) -> ListingQuery {
        let page = page_params(self.limit.as_deref(), self.offset.as_deref());
        ListingQuery {
            q: non_blank(self.q),
            category: non_blank(self.category),
            location: non_blank(self.location),
            featured_only: parse_flag(self.featured.as_deref()),
            page,
        }
    }
}

/// Pagination from raw query values
pub(crate) fn page_params(limit: Option<&str>, offset: Option<&str>) -> PageParams {
    PageParams::new(
        limit.and_then(|v| v.trim().parse().ok()),
        offset.and_then(|v| v.trim().parse().ok()),
    )
}

/// Pagination block of a list response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl<T> From<&PagedResult<T>> for PaginationResponse {
    fn from(page: &PagedResult<T>) -> Self {
        Self {
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more(),
        }
    }
}

/// Response for listing search
#[derive(Debug, Serialize)]
pub struct ListingListResponse {
    pub listings: Vec<ListingDetail>,
    pub pagination: PaginationResponse,
}

impl From<PagedResult<ListingDetail>> for ListingListResponse {
    fn from(page: PagedResult<ListingDetail>) -> Self {
        let pagination = PaginationResponse::from(&page);
        Self {
            listings: page.items,
            pagination,
        }
    }
}

/// Summary of a freshly submitted listing
#[derive(Debug, Serialize)]
pub struct SubmittedListing {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub status: ListingStatus,
}

/// Response for a successful submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub listing: SubmittedListing,
}

/// Response for listing detail
#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub listing: ListingDetail,
}

/// Build the listings router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_listings).post(submit_listing))
        .route("/{slug}", get(get_listing))
}

/// GET /api/listings - Search approved listings
async fn search_listings(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListingListResponse>, ApiError> {
    let page = state.listing_service.search(&query.into_query()).await?;
    Ok(Json(page.into()))
}

/// POST /api/listings - Submit a listing
async fn submit_listing(
    State(state): State<AppState>,
    body: Result<Json<SubmitListingInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(input) = body.map_err(|e| ApiError::validation_error(e.body_text()))?;

    let listing = state.listing_service.submit(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            listing: SubmittedListing {
                id: listing.id,
                name: listing.name,
                slug: listing.slug,
                status: listing.status,
            },
        }),
    ))
}

/// GET /api/listings/{slug} - Approved listing detail
async fn get_listing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing = state.listing_service.get_public(&slug).await?;
    Ok(Json(ListingResponse { listing }))
}
