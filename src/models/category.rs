//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category a listing is filed under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug, unique among categories
    pub slug: String,
    /// Category name
    pub name: String,
    /// Category description
    pub description: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a category
#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

impl CreateCategoryInput {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
