//! Admin user repository
//!
//! Database operations for administrator accounts.

use crate::config::DatabaseDriver;
use crate::db::{backend, on_backend, Backend, DynDatabasePool};
use crate::models::AdminUser;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Admin user repository trait
#[async_trait]
pub trait AdminUserRepository: Send + Sync {
    /// Create a new admin user from an already-hashed password
    async fn create(&self, email: &str, password_hash: &str) -> Result<AdminUser>;

    /// Get admin user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<AdminUser>>;

    /// Return the admin with `email`, creating it if absent.
    ///
    /// An existing account keeps its password.
    async fn find_or_create_by_email(&self, email: &str, password_hash: &str) -> Result<AdminUser>;
}

/// SQLx-based admin user repository implementation
pub struct SqlxAdminUserRepository {
    pool: DynDatabasePool,
}

impl SqlxAdminUserRepository {
    /// Create a new SQLx admin user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AdminUserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AdminUserRepository for SqlxAdminUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> Result<AdminUser> {
        let now = Utc::now();
        let sql = "INSERT INTO admin_users (email, password_hash, created_at, updated_at) \
                   VALUES (?, ?, ?, ?)";

        let id = match backend(&self.pool)? {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(email)
                .bind(password_hash)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create admin user")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(email)
                .bind(password_hash)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create admin user")?
                .last_insert_id() as i64,
        };

        Ok(AdminUser {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
        let sql = "SELECT id, email, password_hash, created_at, updated_at \
                   FROM admin_users WHERE email = ?";
        on_backend!(&self.pool, |p| {
            let row = sqlx::query(sql)
                .bind(email)
                .fetch_optional(p)
                .await
                .context("Failed to get admin user by email")?;
            match row {
                Some(row) => Ok(Some(AdminUser {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                    password_hash: row.try_get("password_hash")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })),
                None => Ok(None),
            }
        })
    }

    async fn find_or_create_by_email(&self, email: &str, password_hash: &str) -> Result<AdminUser> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "INSERT INTO admin_users (email, password_hash, created_at, updated_at) \
                 VALUES (?, ?, ?, ?) ON CONFLICT(email) DO NOTHING"
            }
            DatabaseDriver::Mysql => {
                "INSERT IGNORE INTO admin_users (email, password_hash, created_at, updated_at) \
                 VALUES (?, ?, ?, ?)"
            }
        };
        let now = Utc::now();
        on_backend!(&self.pool, |p| {
            sqlx::query(sql)
                .bind(email)
                .bind(password_hash)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to find or create admin user")?;
            Ok::<_, anyhow::Error>(())
        })?;

        self.get_by_email(email)
            .await?
            .ok_or_else(|| anyhow!("Admin user '{}' vanished after upsert", email))
    }
}
