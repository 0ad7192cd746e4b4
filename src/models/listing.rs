//! Listing model
//!
//! This module defines:
//! - `Listing` entity, one directory entry
//! - `ListingStatus` enum for moderation states
//! - `ListingDetail` with its resolved location, categories and tags
//! - Input and query types used by the repository and services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, Location, Tag};

/// Listing entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug, immutable once assigned
    pub slug: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Optional website URL
    pub website_url: Option<String>,
    /// Contact email
    pub contact_email: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Location ID
    pub location_id: i64,
    /// Moderation status
    pub status: ListingStatus,
    /// Featured flag, only ever true while approved
    pub is_featured: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Whether the listing is shown to the public
    pub fn is_public(&self) -> bool {
        self.status == ListingStatus::Approved
    }
}

/// Listing moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Awaiting moderation
    #[default]
    Pending,
    /// Visible to the public
    Approved,
    /// Turned down, never visible
    Rejected,
}

impl ListingStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        }
    }

    /// Parse status from its string representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(ListingStatus::Pending),
            "approved" => Some(ListingStatus::Approved),
            "rejected" => Some(ListingStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Listing with its related reference entities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub location: Location,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

/// Input for inserting a listing row with its join records
#[derive(Debug, Clone)]
pub struct CreateListingInput {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub website_url: Option<String>,
    pub contact_email: String,
    pub phone: Option<String>,
    pub location_id: i64,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub status: ListingStatus,
    pub is_featured: bool,
}

/// Default page size for listing queries
pub const DEFAULT_LIMIT: i64 = 20;
/// Largest page size a caller may request
pub const MAX_LIMIT: i64 = 100;

/// Limit/offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PageParams {
    /// Build pagination from optional raw values, clamping into range
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

/// Filters for the public listing search
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    /// Case-insensitive substring matched against name or description
    pub q: Option<String>,
    /// Category slug
    pub category: Option<String>,
    /// Location slug
    pub location: Option<String>,
    /// Only featured listings
    pub featured_only: bool,
    pub page: PageParams,
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, page: PageParams) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }

    /// Whether more items exist past this page
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.limit) < self.total
    }
}
