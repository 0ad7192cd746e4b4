//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form tag attached to listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug, unique among tags
    pub slug: String,
    /// Tag name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
