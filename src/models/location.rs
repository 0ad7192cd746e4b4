//! Location model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location a listing operates in, e.g. "New York, NY"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug, unique among locations
    pub slug: String,
    /// Display name
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a location
#[derive(Debug, Clone, Default)]
pub struct CreateLocationInput {
    pub slug: String,
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl CreateLocationInput {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set city, region and country
    pub fn with_place(
        mut self,
        city: impl Into<String>,
        region: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.city = Some(city.into());
        self.region = Some(region.into());
        self.country = Some(country.into());
        self
    }
}
