//! Category repository
//!
//! Database operations for categories.
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{on_backend, Backend, DynDatabasePool};
use crate::models::{Category, CreateCategoryInput};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, input: &CreateCategoryInput) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Get every category whose id is in `ids`
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>>;

    /// List all categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    /// List the categories attached to a listing
    async fn list_for_listing(&self, listing_id: i64) -> Result<Vec<Category>>;

    /// Check if a category slug already exists
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Return the category with `input.slug`, creating it from `input` if absent.
    ///
    /// Idempotent: concurrent callers with the same slug all get the same row.
    async fn find_or_create_by_slug(&self, input: &CreateCategoryInput) -> Result<Category>;
}

/// SQLx-based category repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, slug, name, description, created_at";

macro_rules! category_from_row {
    ($row:expr) => {
        Category {
            id: $row.try_get("id")?,
            slug: $row.try_get("slug")?,
            name: $row.try_get("name")?,
            description: $row.try_get("description")?,
            created_at: $row.try_get("created_at")?,
        }
    };
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, input: &CreateCategoryInput) -> Result<Category> {
        let now = Utc::now();
        let sql = "INSERT INTO categories (slug, name, description, created_at) VALUES (?, ?, ?, ?)";

        let id = match crate::db::backend(&self.pool)? {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.description)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create category")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.description)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create category")?
                .last_insert_id() as i64,
        };

        Ok(Category {
            id,
            slug: input.slug.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories WHERE id = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get category by ID")?;
            match row {
                Some(row) => Ok(Some(category_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories WHERE slug = ?");
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get category by slug")?;
            match row {
                Some(row) => Ok(Some(category_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {COLUMNS} FROM categories WHERE id IN ({placeholders}) ORDER BY name");
        on_backend!(&self.pool, |p| {
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            let rows = query
                .fetch_all(p)
                .await
                .context("Failed to get categories by ID")?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in rows {
                categories.push(category_from_row!(row));
            }
            Ok(categories)
        })
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {COLUMNS} FROM categories ORDER BY name");
        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(&sql)
                .fetch_all(p)
                .await
                .context("Failed to list categories")?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in rows {
                categories.push(category_from_row!(row));
            }
            Ok(categories)
        })
    }

    async fn list_for_listing(&self, listing_id: i64) -> Result<Vec<Category>> {
        let sql = r#"
            SELECT c.id, c.slug, c.name, c.description, c.created_at
            FROM categories c
            INNER JOIN listing_categories lc ON lc.category_id = c.id
            WHERE lc.listing_id = ?
            ORDER BY c.name
        "#;
        on_backend!(&self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(listing_id)
                .fetch_all(p)
                .await
                .context("Failed to get categories for listing")?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in rows {
                categories.push(category_from_row!(row));
            }
            Ok(categories)
        })
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM categories WHERE slug = ?";
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(sql)
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check category slug")?;
            let count: i64 = row.try_get("count")?;
            Ok(count > 0)
        })
    }

    async fn find_or_create_by_slug(&self, input: &CreateCategoryInput) -> Result<Category> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "INSERT INTO categories (slug, name, description, created_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(slug) DO NOTHING"
            }
            DatabaseDriver::Mysql => {
                "INSERT IGNORE INTO categories (slug, name, description, created_at) VALUES (?, ?, ?, ?)"
            }
        };
        let now = Utc::now();
        on_backend!(&self.pool, |p| {
            sqlx::query(sql)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.description)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to find or create category")?;
            Ok::<_, anyhow::Error>(())
        })?;

        self.get_by_slug(&input.slug)
            .await?
            .ok_or_else(|| anyhow!("Category '{}' vanished after upsert", input.slug))
    }
}
