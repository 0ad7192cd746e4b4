//! Location repository
//!
//! Database operations for locations.

use crate::config::DatabaseDriver;
use crate::db::{backend, on_backend, Backend, DynDatabasePool};
use crate::models::{CreateLocationInput, Location};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Location repository trait
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Create a new location
    async fn create(&self, input: &CreateLocationInput) -> Result<Location>;

    /// Get location by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// Get location by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Location>>;

    /// List all locations ordered by name
    async fn list(&self) -> Result<Vec<Location>>;

    /// Check if a location slug already exists
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Return the location with `input.slug`, creating it from `input` if absent
    async fn find_or_create_by_slug(&self, input: &CreateLocationInput) -> Result<Location>;
}

/// SQLx-based location repository implementation
pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    /// Create a new SQLx location repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, slug, name, city, region, country, created_at";

macro_rules! location_from_row {
    ($row:expr) => {
        Location {
            id: $row.try_get("id")?,
            slug: $row.try_get("slug")?,
            name: $row.try_get("name")?,
            city: $row.try_get("city")?,
            region: $row.try_get("region")?,
            country: $row.try_get("country")?,
            created_at: $row.try_get("created_at")?,
        }
    };
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, input: &CreateLocationInput) -> Result<Location> {
        let now = Utc::now();
        let sql = "INSERT INTO locations (slug, name, city, region, country, created_at) \
                   VALUES (?, ?, ?, ?, ?, ?)";

        let id = match backend(&self.pool)? {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.city)
                .bind(&input.region)
                .bind(&input.country)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create location")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.city)
                .bind(&input.region)
                .bind(&input.country)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create location")?
                .last_insert_id() as i64,
        };

        Ok(Location {
            id,
            slug: input.slug.clone(),
            name: input.name.clone(),
            city: input.city.clone(),
            region: input.region.clone(),
            country: input.country.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        let sql = format!("SELECT {COLUMNS} FROM locations WHERE id = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get location by ID")?;
            match row {
                Some(row) => Ok(Some(location_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Location>> {
        let sql = format!("SELECT {COLUMNS} FROM locations WHERE slug = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get location by slug")?;
            match row {
                Some(row) => Ok(Some(location_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self) -> Result<Vec<Location>> {
        let sql = format!("SELECT {COLUMNS} FROM locations ORDER BY name");
        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list locations")?;
            let mut locations = Vec::with_capacity(rows.len());
            for row in rows {
                locations.push(location_from_row!(row));
            }
            Ok(locations)
        })
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM locations WHERE slug = ?";
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(sql)
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check location slug")?;
            let count: i64 = row.try_get("count")?;
            Ok(count > 0)
        })
    }

    async fn find_or_create_by_slug(&self, input: &CreateLocationInput) -> Result<Location> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "INSERT INTO locations (slug, name, city, region, country, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(slug) DO NOTHING"
            }
            DatabaseDriver::Mysql => {
                "INSERT IGNORE INTO locations (slug, name, city, region, country, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)"
            }
        };
        let now = Utc::now();
        on_backend!(&self.pool, |p| {
            sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.city)
                .bind(&input.region)
                .bind(&input.country)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to find or create location")?;
            Ok::<_, anyhow::Error>(())
        })?;

        self.get_by_slug(&input.slug)
            .await?
            .ok_or_else(|| anyhow!("Location '{}' vanished after upsert", input.slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxLocationRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxLocationRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_location_with_place() {
        let repo = setup_test_repo().await;
        let input = CreateLocationInput::new("new-york-ny", "New York, NY")
            .with_place("New York", "NY", "USA");

        let created = repo.create(&input).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "New York, NY");
        assert_eq!(fetched.city.as_deref(), Some("New York"));
        assert_eq!(fetched.region.as_deref(), Some("NY"));
        assert_eq!(fetched.country.as_deref(), Some("USA"));
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let repo = setup_test_repo().await;
        repo.create(&CreateLocationInput::new("dallas-tx", "Dallas, TX"))
            .await
            .unwrap();
        repo.create(&CreateLocationInput::new("austin-tx", "Austin, TX"))
            .await
            .unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Austin, TX", "Dallas, TX"]);
    }

    #[tokio::test]
    async fn test_find_or_create_keeps_existing_row() {
        let repo = setup_test_repo().await;
        let original = repo
            .create(&CreateLocationInput::new("chicago-il", "Chicago, IL").with_place("Chicago", "IL", "USA"))
            .await
            .unwrap();

        let found = repo
            .find_or_create_by_slug(&CreateLocationInput::new("chicago-il", "Chicago"))
            .await
            .unwrap();

        assert_eq!(found.id, original.id);
        assert_eq!(found.city.as_deref(), Some("Chicago"));
        assert!(repo.slug_exists("chicago-il").await.unwrap());
        assert!(repo.get_by_slug("houston-tx").await.unwrap().is_none());
    }
}
