//! Tag repository
//!
//! Database operations for tags.

use crate::config::DatabaseDriver;
use crate::db::{backend, on_backend, Backend, DynDatabasePool};
use crate::models::Tag;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, slug: &str, name: &str) -> Result<Tag>;

    /// Get tag by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Get every tag whose id is in `ids`
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// List the tags attached to a listing
    async fn list_for_listing(&self, listing_id: i64) -> Result<Vec<Tag>>;

    /// Check if a tag slug already exists
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Return the tag with `slug`, creating it if absent
    async fn find_or_create_by_slug(&self, slug: &str, name: &str) -> Result<Tag>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, slug, name, created_at";

macro_rules! tag_from_row {
    ($row:expr) => {
        Tag {
            id: $row.try_get("id")?,
            slug: $row.try_get("slug")?,
            name: $row.try_get("name")?,
            created_at: $row.try_get("created_at")?,
        }
    };
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, slug: &str, name: &str) -> Result<Tag> {
        let now = Utc::now();
        let sql = "INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?)";

        let id = match backend(&self.pool)? {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(slug)
                .bind(name)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create tag")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(slug)
                .bind(name)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create tag")?
                .last_insert_id() as i64,
        };

        Ok(Tag {
            id,
            slug: slug.to_string(),
            name: name.to_string(),
            created_at: now,
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT {COLUMNS} FROM tags WHERE slug = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by slug")?;
            match row {
                Some(row) => Ok(Some(tag_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {COLUMNS} FROM tags WHERE id IN ({placeholders}) ORDER BY name");
        on_backend!(&self.pool, |p| {
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            let rows = query.fetch_all(p).await.context("Failed to get tags by ID")?;
            let mut tags = Vec::with_capacity(rows.len());
            for row in rows {
                tags.push(tag_from_row!(row));
            }
            Ok(tags)
        })
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let sql = format!("SELECT {COLUMNS} FROM tags ORDER BY name");
        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list tags")?;
            let mut tags = Vec::with_capacity(rows.len());
            for row in rows {
                tags.push(tag_from_row!(row));
            }
            Ok(tags)
        })
    }

    async fn list_for_listing(&self, listing_id: i64) -> Result<Vec<Tag>> {
        let sql = r#"
            SELECT t.id, t.slug, t.name, t.created_at
            FROM tags t
            INNER JOIN listing_tags lt ON lt.tag_id = t.id
            WHERE lt.listing_id = ?
            ORDER BY t.name
        "#;
        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(listing_id)
                .fetch_all(p)
                .await
                .context("Failed to get tags for listing")?;
            let mut tags = Vec::with_capacity(rows.len());
            for row in rows {
                tags.push(tag_from_row!(row));
            }
            Ok(tags)
        })
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM tags WHERE slug = ?";
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(sql)
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check tag slug")?;
            let count: i64 = row.try_get("count")?;
            Ok(count > 0)
        })
    }

    async fn find_or_create_by_slug(&self, slug: &str, name: &str) -> Result<Tag> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "INSERT INTO tags (slug, name, created_at) VALUES (?, ?, ?) ON CONFLICT(slug) DO NOTHING"
            }
            DatabaseDriver::Mysql => "INSERT IGNORE INTO tags (slug, name, created_at) VALUES (?, ?, ?)",
        };
        let now = Utc::now();
        on_backend!(&self.pool, |p| {
            sqlx::query(sql)
                .bind(slug)
                .bind(name)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to find or create tag")?;
            Ok::<_, anyhow::Error>(())
        })?;

        self.get_by_slug(slug)
            .await?
            .ok_or_else(|| anyhow!("Tag '{}' vanished after upsert", slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxTagRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxTagRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_list_tags() {
        let repo = setup_test_repo().await;
        repo.create("wifi", "Wifi").await.unwrap();
        repo.create("family-friendly", "Family Friendly").await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Family Friendly", "Wifi"]);
    }

    #[tokio::test]
    async fn test_get_by_ids() {
        let repo = setup_test_repo().await;
        let wifi = repo.create("wifi", "Wifi").await.unwrap();

        let found = repo.get_by_ids(&[wifi.id]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "wifi");
        assert!(repo.get_by_ids(&[wifi.id + 100]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_or_create_by_slug() {
        let repo = setup_test_repo().await;

        let created = repo.find_or_create_by_slug("outdoor-seating", "Outdoor Seating").await.unwrap();
        let again = repo.find_or_create_by_slug("outdoor-seating", "Outdoor Seating").await.unwrap();

        assert_eq!(created.id, again.id);
        assert!(repo.slug_exists("outdoor-seating").await.unwrap());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
