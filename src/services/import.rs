//! CSV listing import
//!
//! Bulk-loads listings from a CSV file with the header
//! `name,description,websiteUrl,contactEmail,phone,locationName,categoryNames,status,isFeatured`.
//! `categoryNames` is pipe-separated. Locations and categories are matched
//! by slug and created when missing. A failing row is reported and skipped;
//! it never aborts the rest of the file.

use crate::db::repositories::{CategoryRepository, ListingRepository, LocationRepository};
use crate::models::{CreateCategoryInput, CreateListingInput, CreateLocationInput, Listing, ListingStatus};
use crate::services::listing::{validate_submission, ListingServiceError, SubmitListingInput};
use crate::services::slug::{self, base_slug};
use anyhow::Context;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Columns a file must have
pub const REQUIRED_COLUMNS: [&str; 4] = ["name", "contactEmail", "locationName", "categoryNames"];

/// Errors that abort the whole import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// One CSV row
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportRow {
    pub name: String,
    pub description: String,
    pub website_url: Option<String>,
    pub contact_email: String,
    pub phone: Option<String>,
    pub location_name: String,
    pub category_names: String,
    pub status: Option<String>,
    pub is_featured: Option<String>,
}

impl ImportRow {
    fn categories(&self) -> Vec<&str> {
        self.category_names
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn status(&self) -> Result<ListingStatus, ListingServiceError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(ListingStatus::Pending),
            Some(raw) => ListingStatus::parse(raw).ok_or_else(|| ListingServiceError::Validation {
                field: "status",
                message: format!("Unknown status '{}'", raw),
            }),
        }
    }

    fn featured_flag(&self) -> bool {
        self.is_featured
            .as_deref()
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }
}

/// A row that was not imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based line in the file
    pub line: u64,
    pub name: String,
    pub reason: String,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub imported: Vec<Listing>,
    pub failures: Vec<RowFailure>,
}

impl ImportSummary {
    /// Rows processed
    pub fn total(&self) -> usize {
        self.imported.len() + self.failures.len()
    }
}

/// CSV importer
pub struct Importer {
    listings: Arc<dyn ListingRepository>,
    categories: Arc<dyn CategoryRepository>,
    locations: Arc<dyn LocationRepository>,
}

impl Importer {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        categories: Arc<dyn CategoryRepository>,
        locations: Arc<dyn LocationRepository>,
    ) -> Self {
        Self {
            listings,
            categories,
            locations,
        }
    }

    /// Import the CSV file at `path`
    pub async fn import_path(&self, path: &Path) -> Result<ImportSummary, ImportError> {
        let file = std::fs::File::open(path).map_err(|source| ImportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.import_reader(file).await
    }

    /// Import CSV data from `reader`
    pub async fn import_reader<R: Read>(&self, reader: R) -> Result<ImportSummary, ImportError> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(ImportError::MissingColumn(column));
            }
        }

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            rows.push((line, record.deserialize::<ImportRow>(Some(&headers))));
        }

        let mut summary = ImportSummary::default();
        for (line, row) in rows {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping line {}: {}", line, e);
                    summary.failures.push(RowFailure {
                        line,
                        name: String::new(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.import_row(&row).await {
                Ok(listing) => {
                    tracing::info!("Imported '{}' as {}", listing.name, listing.slug);
                    summary.imported.push(listing);
                }
                Err(e) => {
                    tracing::warn!("Skipping line {} ('{}'): {}", line, row.name, e);
                    summary.failures.push(RowFailure {
                        line,
                        name: row.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Import finished: {} imported, {} failed",
            summary.imported.len(),
            summary.failures.len()
        );
        Ok(summary)
    }

    async fn import_row(&self, row: &ImportRow) -> Result<Listing, ListingServiceError> {
        let status = row.status()?;
        let location_name = row.location_name.trim();
        if location_name.is_empty() {
            return Err(ListingServiceError::Validation {
                field: "locationName",
                message: "Location is required".to_string(),
            });
        }
        let category_names = row.categories();
        if category_names.is_empty() {
            return Err(ListingServiceError::Validation {
                field: "categoryNames",
                message: "At least one category is required".to_string(),
            });
        }

        let location = self
            .locations
            .find_or_create_by_slug(&CreateLocationInput::new(base_slug(location_name), location_name))
            .await
            .context("Failed to resolve location")?;

        let mut category_ids = Vec::with_capacity(category_names.len());
        for name in category_names {
            let category = self
                .categories
                .find_or_create_by_slug(&CreateCategoryInput::new(base_slug(name), name))
                .await
                .context("Failed to resolve category")?;
            category_ids.push(category.id);
        }

        let valid = validate_submission(&SubmitListingInput {
            name: row.name.clone(),
            website_url: row.website_url.clone(),
            contact_email: row.contact_email.clone(),
            phone: row.phone.clone(),
            location_id: Some(location.id),
            category_ids,
            tag_ids: Vec::new(),
            description: row.description.clone(),
        })?;

        let is_featured = status == ListingStatus::Approved && row.featured_flag();

        let listing = slug::create_unique(&valid.name, &*self.listings, |slug| {
            let input = CreateListingInput {
                slug,
                name: valid.name.clone(),
                description: valid.description.clone(),
                website_url: valid.website_url.clone(),
                contact_email: valid.contact_email.clone(),
                phone: valid.phone.clone(),
                location_id: valid.location_id,
                category_ids: valid.category_ids.clone(),
                tag_ids: Vec::new(),
                status,
                is_featured,
            };
            let listings = self.listings.clone();
            async move { listings.create(&input).await }
        })
        .await?;

        Ok(listing)
    }
}
