//! Listing repository
//!
//! Database operations for listings, their category/tag join records and the
//! moderation audit trail.
//!
//! Moderation transitions are conditional updates: the row only changes if
//! it still has the status the caller observed. See [`TransitionOutcome`].

use crate::db::{backend, on_backend, Backend, DynDatabasePool};
use crate::models::{
    CreateListingInput, Listing, ListingQuery, ListingStatus, ModerationAction, ModerationEvent,
    PageParams, PagedResult, Principal, Transition,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Result of a conditional moderation update
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The update matched and the audit event was recorded
    Applied(Listing),
    /// No listing with that id
    NotFound,
    /// The listing no longer had the expected status; holds its current state
    Stale(Listing),
}

/// Listing repository trait
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Insert a listing together with its category and tag links, atomically
    async fn create(&self, input: &CreateListingInput) -> Result<Listing>;

    /// Get listing by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Listing>>;

    /// Get listing by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Listing>>;

    /// Check if a listing slug already exists
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Approved listings matching `query`, featured first then newest
    async fn search_public(&self, query: &ListingQuery) -> Result<PagedResult<Listing>>;

    /// All listings for moderation, newest first, optionally filtered by status
    async fn list_admin(
        &self,
        status: Option<ListingStatus>,
        page: PageParams,
    ) -> Result<PagedResult<Listing>>;

    /// Apply `transition` if the listing still has `transition.from_status`,
    /// recording a moderation event in the same transaction
    async fn apply_transition(
        &self,
        id: i64,
        transition: &Transition,
        actor: &Principal,
    ) -> Result<TransitionOutcome>;

    /// Moderation events for a listing, oldest first
    async fn list_events(&self, listing_id: i64) -> Result<Vec<ModerationEvent>>;
}

/// SQLx-based listing repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxListingRepository {
    pool: DynDatabasePool,
}

impl SqlxListingRepository {
    /// Create a new SQLx listing repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ListingRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "l.id, l.slug, l.name, l.description, l.website_url, l.contact_email, \
                       l.phone, l.location_id, l.status, l.is_featured, l.created_at, l.updated_at";

const INSERT_LISTING: &str = r#"
    INSERT INTO listings (slug, name, description, website_url, contact_email, phone,
                          location_id, status, is_featured, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_LISTING_CATEGORY: &str =
    "INSERT INTO listing_categories (listing_id, category_id) VALUES (?, ?)";

const INSERT_LISTING_TAG: &str = "INSERT INTO listing_tags (listing_id, tag_id) VALUES (?, ?)";

/// Public search predicate. Every optional filter is bound twice: once for
/// the `IS NULL` short-circuit and once for the comparison.
const PUBLIC_WHERE: &str = r#"
    WHERE l.status = ?
      AND (? IS NULL OR LOWER(l.name) LIKE ? ESCAPE '!' OR LOWER(l.description) LIKE ? ESCAPE '!')
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM listing_categories lc
            INNER JOIN categories c ON c.id = lc.category_id
            WHERE lc.listing_id = l.id AND c.slug = ?))
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM locations loc
            WHERE loc.id = l.location_id AND loc.slug = ?))
      AND (? = 0 OR l.is_featured = 1)
"#;

const ADMIN_WHERE: &str = "WHERE (? IS NULL OR l.status = ?)";

const CONDITIONAL_UPDATE: &str = r#"
    UPDATE listings
    SET status = ?, is_featured = ?, updated_at = ?
    WHERE id = ? AND status = ?
"#;

const INSERT_EVENT: &str = r#"
    INSERT INTO moderation_events (listing_id, action, from_status, to_status, featured,
                                   actor_id, actor_email, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

macro_rules! listing_from_row {
    ($row:expr) => {{
        let status: String = $row.try_get("status")?;
        Listing {
            id: $row.try_get("id")?,
            slug: $row.try_get("slug")?,
            name: $row.try_get("name")?,
            description: $row.try_get("description")?,
            website_url: $row.try_get("website_url")?,
            contact_email: $row.try_get("contact_email")?,
            phone: $row.try_get("phone")?,
            location_id: $row.try_get("location_id")?,
            status: ListingStatus::parse(&status)
                .ok_or_else(|| anyhow!("Unknown listing status in database: {}", status))?,
            is_featured: $row.try_get("is_featured")?,
            created_at: $row.try_get("created_at")?,
            updated_at: $row.try_get("updated_at")?,
        }
    }};
}

macro_rules! event_from_row {
    ($row:expr) => {{
        let action: String = $row.try_get("action")?;
        let from_status: String = $row.try_get("from_status")?;
        let to_status: String = $row.try_get("to_status")?;
        ModerationEvent {
            id: $row.try_get("id")?,
            listing_id: $row.try_get("listing_id")?,
            action: ModerationAction::parse(&action)
                .ok_or_else(|| anyhow!("Unknown moderation action in database: {}", action))?,
            from_status: ListingStatus::parse(&from_status)
                .ok_or_else(|| anyhow!("Unknown listing status in database: {}", from_status))?,
            to_status: ListingStatus::parse(&to_status)
                .ok_or_else(|| anyhow!("Unknown listing status in database: {}", to_status))?,
            featured: $row.try_get("featured")?,
            actor_id: $row.try_get("actor_id")?,
            actor_email: $row.try_get("actor_email")?,
            created_at: $row.try_get("created_at")?,
        }
    }};
}

macro_rules! insert_listing_query {
    ($input:expr, $now:expr) => {
        sqlx::query(INSERT_LISTING)
            .bind(&$input.slug)
            .bind(&$input.name)
            .bind(&$input.description)
            .bind(&$input.website_url)
            .bind(&$input.contact_email)
            .bind(&$input.phone)
            .bind($input.location_id)
            .bind($input.status.as_str())
            .bind($input.is_featured)
            .bind($now)
            .bind($now)
    };
}

/// Escape LIKE wildcards so user text matches literally (escape char `!`)
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl ListingRepository for SqlxListingRepository {
    async fn create(&self, input: &CreateListingInput) -> Result<Listing> {
        let now = Utc::now();

        let id = match backend(&self.pool)? {
            Backend::Sqlite(p) => {
                let mut tx = p.begin().await.context("Failed to begin transaction")?;
                let id = insert_listing_query!(input, now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create listing")?
                    .last_insert_rowid();
                for category_id in &input.category_ids {
                    sqlx::query(INSERT_LISTING_CATEGORY)
                        .bind(id)
                        .bind(category_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to link listing category")?;
                }
                for tag_id in &input.tag_ids {
                    sqlx::query(INSERT_LISTING_TAG)
                        .bind(id)
                        .bind(tag_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to link listing tag")?;
                }
                tx.commit().await.context("Failed to commit listing")?;
                id
            }
            Backend::Mysql(p) => {
                let mut tx = p.begin().await.context("Failed to begin transaction")?;
                let id = insert_listing_query!(input, now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create listing")?
                    .last_insert_id() as i64;
                for category_id in &input.category_ids {
                    sqlx::query(INSERT_LISTING_CATEGORY)
                        .bind(id)
                        .bind(category_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to link listing category")?;
                }
                for tag_id in &input.tag_ids {
                    sqlx::query(INSERT_LISTING_TAG)
                        .bind(id)
                        .bind(tag_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to link listing tag")?;
                }
                tx.commit().await.context("Failed to commit listing")?;
                id
            }
        };

        Ok(Listing {
            id,
            slug: input.slug.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            website_url: input.website_url.clone(),
            contact_email: input.contact_email.clone(),
            phone: input.phone.clone(),
            location_id: input.location_id,
            status: input.status,
            is_featured: input.is_featured,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Listing>> {
        let sql = format!("SELECT {COLUMNS} FROM listings l WHERE l.id = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get listing by ID")?;
            match row {
                Some(row) => Ok(Some(listing_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Listing>> {
        let sql = format!("SELECT {COLUMNS} FROM listings l WHERE l.slug = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get listing by slug")?;
            match row {
                Some(row) => Ok(Some(listing_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM listings WHERE slug = ?";
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(sql)
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check listing slug")?;
            let count: i64 = row.try_get("count")?;
            Ok(count > 0)
        })
    }

    async fn search_public(&self, query: &ListingQuery) -> Result<PagedResult<Listing>> {
        let pattern = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern);
        let category = query.category.as_deref().filter(|s| !s.is_empty());
        let location = query.location.as_deref().filter(|s| !s.is_empty());
        let approved = ListingStatus::Approved.as_str();

        let select_sql = format!(
            "SELECT {COLUMNS} FROM listings l {PUBLIC_WHERE} \
             ORDER BY l.is_featured DESC, l.created_at DESC, l.id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM listings l {PUBLIC_WHERE}");

        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(&select_sql)
                .bind(approved)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(category)
                .bind(category)
                .bind(location)
                .bind(location)
                .bind(query.featured_only)
                .bind(query.page.limit)
                .bind(query.page.offset)
                .fetch_all(p)
                .await
                .context("Failed to search listings")?;

            let count_row = sqlx::query(&count_sql)
                .bind(approved)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(category)
                .bind(category)
                .bind(location)
                .bind(location)
                .bind(query.featured_only)
                .fetch_one(p)
                .await
                .context("Failed to count listings")?;
            let total: i64 = count_row.try_get("count")?;

            let mut listings = Vec::with_capacity(rows.len());
            for row in rows {
                listings.push(listing_from_row!(row));
            }
            Ok(PagedResult::new(listings, total, query.page))
        })
    }

    async fn list_admin(
        &self,
        status: Option<ListingStatus>,
        page: PageParams,
    ) -> Result<PagedResult<Listing>> {
        let status = status.map(|s| s.as_str());
        let select_sql = format!(
            "SELECT {COLUMNS} FROM listings l {ADMIN_WHERE} \
             ORDER BY l.created_at DESC, l.id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM listings l {ADMIN_WHERE}");

        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(&select_sql)
                .bind(status)
                .bind(status)
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(p)
                .await
                .context("Failed to list listings")?;

            let count_row = sqlx::query(&count_sql)
                .bind(status)
                .bind(status)
                .fetch_one(p)
                .await
                .context("Failed to count listings")?;
            let total: i64 = count_row.try_get("count")?;

            let mut listings = Vec::with_capacity(rows.len());
            for row in rows {
                listings.push(listing_from_row!(row));
            }
            Ok(PagedResult::new(listings, total, page))
        })
    }

    async fn apply_transition(
        &self,
        id: i64,
        transition: &Transition,
        actor: &Principal,
    ) -> Result<TransitionOutcome> {
        let now = Utc::now();

        let applied = on_backend!(&self.pool, |p| {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;

            let updated = sqlx::query(CONDITIONAL_UPDATE)
                .bind(transition.to_status.as_str())
                .bind(transition.featured)
                .bind(now)
                .bind(id)
                .bind(transition.from_status.as_str())
                .execute(&mut *tx)
                .await
                .context("Failed to update listing status")?
                .rows_affected();

            if updated == 0 {
                tx.rollback().await.context("Failed to roll back transition")?;
                false
            } else {
                sqlx::query(INSERT_EVENT)
                    .bind(id)
                    .bind(transition.action.as_str())
                    .bind(transition.from_status.as_str())
                    .bind(transition.to_status.as_str())
                    .bind(transition.featured)
                    .bind(&actor.id)
                    .bind(&actor.email)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to record moderation event")?;
                tx.commit().await.context("Failed to commit transition")?;
                true
            }
        });

        let current = self.get_by_id(id).await?;
        Ok(match (applied, current) {
            (true, Some(listing)) => TransitionOutcome::Applied(listing),
            (true, None) => return Err(anyhow!("Listing {} vanished after transition", id)),
            (false, Some(listing)) => TransitionOutcome::Stale(listing),
            (false, None) => TransitionOutcome::NotFound,
        })
    }

    async fn list_events(&self, listing_id: i64) -> Result<Vec<ModerationEvent>> {
        let sql = r#"
            SELECT id, listing_id, action, from_status, to_status, featured,
                   actor_id, actor_email, created_at
            FROM moderation_events
            WHERE listing_id = ?
            ORDER BY id
        "#;
        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(listing_id)
                .fetch_all(p)
                .await
                .context("Failed to list moderation events")?;
            let mut events = Vec::with_capacity(rows.len());
            for row in rows {
                events.push(event_from_row!(row));
            }
            Ok(events)
        })
    }
}
