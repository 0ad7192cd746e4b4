//! Listing service
//!
//! Implements business logic for the public side of the directory:
//! - Submission validation and creation (always Pending, never featured)
//! - Public search over approved listings
//! - Listing detail by slug
//! - Reference options (categories, locations, tags)
//! - The moderation table for administrators

use crate::db::repositories::{
    CategoryRepository, ListingRepository, LocationRepository, TagRepository,
};
use crate::models::{
    Category, CreateListingInput, Listing, ListingDetail, ListingQuery, ListingStatus, Location,
    PageParams, PagedResult, Tag,
};
use crate::services::slug::{self, SlugError};
use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Longest accepted display name, in characters
pub const MAX_NAME_LEN: usize = 200;
/// Description length bounds, in characters
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
/// Longest accepted phone number
pub const MAX_PHONE_LEN: usize = 50;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Error types for listing service operations
#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    /// A submitted field failed validation
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    /// Listing not found (or not public)
    #[error("Listing not found: {0}")]
    NotFound(String),

    /// Slug allocation kept losing races
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ListingServiceError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<SlugError> for ListingServiceError {
    fn from(err: SlugError) -> Self {
        match err {
            SlugError::Conflict(base) => Self::Conflict(format!("Slug '{}' is contended", base)),
            SlugError::InternalError(e) => Self::InternalError(e),
        }
    }
}

/// Public submission payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitListingInput {
    pub name: String,
    pub website_url: Option<String>,
    pub contact_email: String,
    pub phone: Option<String>,
    pub location_id: Option<i64>,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub description: String,
}

/// Submission after field validation, before reference checks
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub name: String,
    pub website_url: Option<String>,
    pub contact_email: String,
    pub phone: Option<String>,
    pub location_id: i64,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub description: String,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Absolute http(s) URL with a non-empty host and no whitespace
pub fn is_valid_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !url.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Well-formed email address
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Validate a submission, reporting the first failing field.
///
/// Fields are checked in order: name, websiteUrl, contactEmail, locationId,
/// categoryIds, description, phone.
pub fn validate_submission(input: &SubmitListingInput) -> Result<ValidSubmission, ListingServiceError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ListingServiceError::validation("name", "Name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ListingServiceError::validation(
            "name",
            format!("Name must be at most {} characters", MAX_NAME_LEN),
        ));
    }

    let website_url = non_empty(input.website_url.as_deref());
    if let Some(url) = &website_url {
        if !is_valid_url(url) {
            return Err(ListingServiceError::validation(
                "websiteUrl",
                "Website URL must be an absolute http(s) URL",
            ));
        }
    }

    let contact_email = input.contact_email.trim();
    if !is_valid_email(contact_email) {
        return Err(ListingServiceError::validation(
            "contactEmail",
            "Invalid email address",
        ));
    }

    let location_id = input
        .location_id
        .ok_or_else(|| ListingServiceError::validation("locationId", "Location is required"))?;

    if input.category_ids.is_empty() {
        return Err(ListingServiceError::validation(
            "categoryIds",
            "At least one category is required",
        ));
    }

    let description = input.description.trim();
    let description_len = description.chars().count();
    if description_len < MIN_DESCRIPTION_LEN {
        return Err(ListingServiceError::validation(
            "description",
            format!("Description must be at least {} characters", MIN_DESCRIPTION_LEN),
        ));
    }
    if description_len > MAX_DESCRIPTION_LEN {
        return Err(ListingServiceError::validation(
            "description",
            format!("Description must be at most {} characters", MAX_DESCRIPTION_LEN),
        ));
    }

    let phone = non_empty(input.phone.as_deref());
    if phone.as_ref().is_some_and(|p| p.chars().count() > MAX_PHONE_LEN) {
        return Err(ListingServiceError::validation(
            "phone",
            format!("Phone must be at most {} characters", MAX_PHONE_LEN),
        ));
    }

    Ok(ValidSubmission {
        name: name.to_string(),
        website_url,
        contact_email: contact_email.to_string(),
        phone,
        location_id,
        category_ids: dedup(&input.category_ids),
        tag_ids: dedup(&input.tag_ids),
        description: description.to_string(),
    })
}

/// Listing service for the public directory
pub struct ListingService {
    listings: Arc<dyn ListingRepository>,
    categories: Arc<dyn CategoryRepository>,
    locations: Arc<dyn LocationRepository>,
    tags: Arc<dyn TagRepository>,
}

impl ListingService {
    /// Create a new listing service
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        categories: Arc<dyn CategoryRepository>,
        locations: Arc<dyn LocationRepository>,
        tags: Arc<dyn TagRepository>,
    ) -> Self {
        Self {
            listings,
            categories,
            locations,
            tags,
        }
    }

    /// Validate and create a public submission.
    ///
    /// The new listing is always Pending and never featured.
    pub async fn submit(&self, input: SubmitListingInput) -> Result<Listing, ListingServiceError> {
        let valid = validate_submission(&input)?;

        if self
            .locations
            .get_by_id(valid.location_id)
            .await
            .context("Failed to check location")?
            .is_none()
        {
            return Err(ListingServiceError::validation("locationId", "Invalid location"));
        }

        let categories = self
            .categories
            .get_by_ids(&valid.category_ids)
            .await
            .context("Failed to check categories")?;
        if categories.len() != valid.category_ids.len() {
            return Err(ListingServiceError::validation("categoryIds", "Invalid categories"));
        }

        let tags = self
            .tags
            .get_by_ids(&valid.tag_ids)
            .await
            .context("Failed to check tags")?;
        if tags.len() != valid.tag_ids.len() {
            return Err(ListingServiceError::validation("tagIds", "Invalid tags"));
        }

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
                tag_ids: valid.tag_ids.clone(),
                status: ListingStatus::Pending,
                is_featured: false,
            };
            let listings = self.listings.clone();
            async move { listings.create(&input).await }
        })
        .await?;

        tracing::info!("Listing submitted: {} ({})", listing.slug, listing.id);
        Ok(listing)
    }

    /// Approved listings matching `query`, with their relations
    pub async fn search(
        &self,
        query: &ListingQuery,
    ) -> Result<PagedResult<ListingDetail>, ListingServiceError> {
        let page = self.listings.search_public(query).await?;
        self.with_details(page).await
    }

    /// Public detail of an approved listing
    pub async fn get_public(&self, slug: &str) -> Result<ListingDetail, ListingServiceError> {
        let listing = self
            .listings
            .get_by_slug(slug)
            .await?
            .filter(Listing::is_public)
            .ok_or_else(|| ListingServiceError::NotFound(slug.to_string()))?;
        Ok(self.detail(listing).await?)
    }

    /// All listings for the moderation table
    pub async fn list_for_moderation(
        &self,
        status: Option<ListingStatus>,
        page: PageParams,
    ) -> Result<PagedResult<ListingDetail>, ListingServiceError> {
        let page = self.listings.list_admin(status, page).await?;
        self.with_details(page).await
    }

    /// Category options
    pub async fn categories(&self) -> Result<Vec<Category>, ListingServiceError> {
        Ok(self.categories.list().await?)
    }

    /// Location options
    pub async fn locations(&self) -> Result<Vec<Location>, ListingServiceError> {
        Ok(self.locations.list().await?)
    }

    /// Tag options
    pub async fn tags(&self) -> Result<Vec<Tag>, ListingServiceError> {
        Ok(self.tags.list().await?)
    }

    async fn with_details(
        &self,
        page: PagedResult<Listing>,
    ) -> Result<PagedResult<ListingDetail>, ListingServiceError> {
        let mut items = Vec::with_capacity(page.items.len());
        for listing in page.items {
            items.push(self.detail(listing).await?);
        }
        Ok(PagedResult {
            items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn detail(&self, listing: Listing) -> anyhow::Result<ListingDetail> {
        let location = self
            .locations
            .get_by_id(listing.location_id)
            .await?
            .ok_or_else(|| anyhow!("Listing {} has no location row", listing.id))?;
        let categories = self.categories.list_for_listing(listing.id).await?;
        let tags = self.tags.list_for_listing(listing.id).await?;

        Ok(ListingDetail {
            listing,
            location,
            categories,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxListingRepository, SqlxLocationRepository, SqlxTagRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateCategoryInput, CreateLocationInput, ModerationAction, Principal};
    use crate::services::moderation::{ModerationError, ModerationService};

    struct Fixture {
        service: ListingService,
        moderation: ModerationService,
        location_id: i64,
        category: Category,
        tag: Tag,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let listings = SqlxListingRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let locations = SqlxLocationRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());

        let location = locations
            .create(&CreateLocationInput::new("new-york-ny", "New York, NY"))
            .await
            .unwrap();
        let category = categories
            .create(&CreateCategoryInput::new("restaurants", "Restaurants"))
            .await
            .unwrap();
        let tag = tags.create("family-friendly", "Family Friendly").await.unwrap();

        Fixture {
            service: ListingService::new(listings.clone(), categories, locations, tags),
            moderation: ModerationService::new(listings),
            location_id: location.id,
            category,
            tag,
        }
    }

    fn joes_pizza(fx: &Fixture) -> SubmitListingInput {
        SubmitListingInput {
            name: "Joe's Pizza".to_string(),
            contact_email: "joe@pizza.com".to_string(),
            location_id: Some(fx.location_id),
            category_ids: vec![fx.category.id],
            description: "Best pizza in town, family owned since 1990.".to_string(),
            ..Default::default()
        }
    }

    fn valid_input() -> SubmitListingInput {
        SubmitListingInput {
            name: "Joe's Pizza".to_string(),
            contact_email: "joe@pizza.com".to_string(),
            location_id: Some(1),
            category_ids: vec![1],
            description: "Best pizza in town".to_string(),
            ..Default::default()
        }
    }

    fn failing_field(input: SubmitListingInput) -> &'static str {
        match validate_submission(&input) {
            Err(ListingServiceError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    fn by_category(slug: &str) -> ListingQuery {
        ListingQuery {
            category: Some(slug.to_string()),
            ..Default::default()
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_accepts_minimal_submission() {
        let valid = validate_submission(&valid_input()).unwrap();
        assert_eq!(valid.name, "Joe's Pizza");
        assert!(valid.website_url.is_none());
        assert!(valid.phone.is_none());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(failing_field(SubmitListingInput { name: "  ".into(), ..valid_input() }), "name");
        assert_eq!(
            failing_field(SubmitListingInput { name: "x".repeat(201), ..valid_input() }),
            "name"
        );
        assert!(validate_submission(&SubmitListingInput { name: "é".repeat(200), ..valid_input() }).is_ok());
    }

    #[test]
    fn test_validate_website_url() {
        let with_url = |url: &str| SubmitListingInput {
            website_url: Some(url.to_string()),
            ..valid_input()
        };
        assert!(validate_submission(&with_url("")).unwrap().website_url.is_none());
        assert!(validate_submission(&with_url("https://joespizza.com/menu")).is_ok());
        assert_eq!(failing_field(with_url("joespizza.com")), "websiteUrl");
        assert_eq!(failing_field(with_url("ftp://joespizza.com")), "websiteUrl");
        assert_eq!(failing_field(with_url("https://")), "websiteUrl");
    }

    #[test]
    fn test_validate_email() {
        for bad in ["", "joe", "joe@", "joe@pizza", "jo e@pizza.com"] {
            assert_eq!(
                failing_field(SubmitListingInput { contact_email: bad.into(), ..valid_input() }),
                "contactEmail",
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_location_and_categories() {
        assert_eq!(
            failing_field(SubmitListingInput { location_id: None, ..valid_input() }),
            "locationId"
        );
        assert_eq!(
            failing_field(SubmitListingInput { category_ids: vec![], ..valid_input() }),
            "categoryIds"
        );
    }

    #[test]
    fn test_validate_description_bounds() {
        let with_description = |d: String| SubmitListingInput {
            description: d,
            ..valid_input()
        };
        assert_eq!(failing_field(with_description("too short".into())), "description");
        assert!(validate_submission(&with_description("x".repeat(10))).is_ok());
        assert!(validate_submission(&with_description("x".repeat(2000))).is_ok());
        assert_eq!(failing_field(with_description("x".repeat(2001))), "description");
    }

    #[test]
    fn test_validate_reports_first_failing_field() {
        let input = SubmitListingInput {
            name: String::new(),
            contact_email: "nope".into(),
            description: String::new(),
            ..Default::default()
        };
        assert_eq!(failing_field(input), "name");

        let input = SubmitListingInput {
            contact_email: "nope".into(),
            category_ids: vec![],
            ..valid_input()
        };
        assert_eq!(failing_field(input), "contactEmail");
    }

    #[test]
    fn test_validate_dedups_ids() {
        let valid = validate_submission(&SubmitListingInput {
            category_ids: vec![3, 1, 3],
            tag_ids: vec![2, 2],
            ..valid_input()
        })
        .unwrap();
        assert_eq!(valid.category_ids, vec![1, 3]);
        assert_eq!(valid.tag_ids, vec![2]);
    }

    // ========================================================================
    // Submission
    // ========================================================================

    #[tokio::test]
    async fn test_submit_creates_pending_listing() {
        let fx = setup().await;
        let listing = fx.service.submit(joes_pizza(&fx)).await.unwrap();

        assert!(listing.id > 0);
        assert_eq!(listing.name, "Joe's Pizza");
        assert_eq!(listing.slug, "joes-pizza");
        assert_eq!(listing.status, ListingStatus::Pending);
        assert!(!listing.is_featured);

        let public = fx.service.search(&by_category(&fx.category.slug)).await.unwrap();
        assert_eq!(public.total, 0);
        assert!(matches!(
            fx.service.get_public("joes-pizza").await,
            Err(ListingServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_same_name_gets_suffix() {
        let fx = setup().await;
        let first = fx.service.submit(joes_pizza(&fx)).await.unwrap();
        let second = fx.service.submit(joes_pizza(&fx)).await.unwrap();
        let third = fx.service.submit(joes_pizza(&fx)).await.unwrap();

        assert_eq!(first.slug, "joes-pizza");
        assert_eq!(second.slug, "joes-pizza-2");
        assert_eq!(third.slug, "joes-pizza-3");
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_references() {
        let fx = setup().await;

        let err = fx
            .service
            .submit(SubmitListingInput {
                location_id: Some(999),
                ..joes_pizza(&fx)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ListingServiceError::Validation { field: "locationId", .. }));

        let err = fx
            .service
            .submit(SubmitListingInput {
                category_ids: vec![fx.category.id, 999],
                ..joes_pizza(&fx)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ListingServiceError::Validation { field: "categoryIds", .. }));

        let err = fx
            .service
            .submit(SubmitListingInput {
                tag_ids: vec![999],
                ..joes_pizza(&fx)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ListingServiceError::Validation { field: "tagIds", .. }));
    }

    #[tokio::test]
    async fn test_detail_includes_relations() {
        let fx = setup().await;
        let listing = fx
            .service
            .submit(SubmitListingInput {
                tag_ids: vec![fx.tag.id],
                ..joes_pizza(&fx)
            })
            .await
            .unwrap();
        fx.moderation
            .apply(listing.id, ModerationAction::Approve, &Principal::new("1", "a@b.co"))
            .await
            .unwrap();

        let detail = fx.service.get_public("joes-pizza").await.unwrap();
        assert_eq!(detail.location.slug, "new-york-ny");
        assert_eq!(detail.categories.len(), 1);
        assert_eq!(detail.tags[0].slug, "family-friendly");
    }

    #[tokio::test]
    async fn test_submit_then_approve_end_to_end() {
        let fx = setup().await;
        let admin = Principal::new("1", "admin@example.com");
        let listing = fx.service.submit(joes_pizza(&fx)).await.unwrap();

        fx.moderation
            .apply(listing.id, ModerationAction::Approve, &admin)
            .await
            .unwrap();

        let public = fx.service.search(&by_category(&fx.category.slug)).await.unwrap();
        assert_eq!(public.total, 1);
        assert_eq!(public.items[0].listing.slug, "joes-pizza");

        let err = fx
            .moderation
            .apply(listing.id, ModerationAction::Reject, &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_moderation_table_includes_every_status() {
        let fx = setup().await;
        fx.service.submit(joes_pizza(&fx)).await.unwrap();

        let all = fx
            .service
            .list_for_moderation(None, PageParams::default())
            .await
            .unwrap();
        assert_eq!(all.total, 1);

        let approved = fx
            .service
            .list_for_moderation(Some(ListingStatus::Approved), PageParams::default())
            .await
            .unwrap();
        assert_eq!(approved.total, 0);
    }

    #[tokio::test]
    async fn test_reference_options() {
        let fx = setup().await;
        assert_eq!(fx.service.categories().await.unwrap().len(), 1);
        assert_eq!(fx.service.locations().await.unwrap().len(), 1);
        assert_eq!(fx.service.tags().await.unwrap().len(), 1);
    }
}
