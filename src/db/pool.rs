//! Connection pools
//!
//! One trait object over the SQLite and MySQL pools, picked by
//! `database.driver` in the configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// A connection pool for one of the supported drivers.
///
/// Repositories reach the typed pool through [`crate::db::backend`].
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

/// Implements the driver-independent part of [`DatabasePool`]; `$accessor`
/// is the one typed accessor that returns `Some`.
macro_rules! impl_database_pool {
    ($ty:ty, $driver:expr, $accessor:ident -> $pool_ty:ty) => {
        #[async_trait]
        impl DatabasePool for $ty {
            async fn ping(&self) -> Result<()> {
                sqlx::query("SELECT 1")
                    .fetch_one(&self.pool)
                    .await
                    .context("Database ping failed")?;
                Ok(())
            }

            async fn close(&self) {
                self.pool.close().await;
            }

            fn driver(&self) -> DatabaseDriver {
                $driver
            }

            fn $accessor(&self) -> Option<&$pool_ty> {
                Some(&self.pool)
            }
        }
    };
}

/// SQLite-backed pool; the default driver
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (and create if missing) a SQLite database.
    ///
    /// Accepts a bare file path, a `sqlite:` URL or `:memory:`.
    pub async fn new(url: &str) -> Result<Self> {
        let in_memory = url == ":memory:" || url.starts_with("sqlite::memory:");

        if !in_memory {
            let path = url.trim_start_matches("sqlite:");
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {:?}", parent)
                    })?;
                }
            }
        }

        let connection_url = match (in_memory, url.strip_prefix("sqlite:")) {
            (true, _) => "sqlite::memory:".to_string(),
            (false, Some(_)) if url.contains('?') => url.to_string(),
            (false, Some(_)) => format!("{}?mode=rwc", url),
            (false, None) => format!("sqlite:{}?mode=rwc", url),
        };

        // An in-memory database exists per connection, so tests pin the pool to one.
        let max_connections = if in_memory { 1 } else { 16 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        // SQLite leaves foreign keys off per connection unless asked.
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .context("Failed to enable foreign keys")?;

        Ok(Self { pool })
    }
}

impl_database_pool!(SqliteDatabase, DatabaseDriver::Sqlite, as_sqlite -> SqlitePool);

/// MySQL-backed pool
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Connect to MySQL; the `mysql://` scheme is optional
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(30)
            .connect(&connection_url)
            .await
            .context("Failed to connect to MySQL database")?;

        Ok(Self { pool })
    }
}

impl_database_pool!(MysqlDatabase, DatabaseDriver::Mysql, as_mysql -> MySqlPool);

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Create a database connection pool based on configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    match config.driver {
        DatabaseDriver::Sqlite => {
            let db = SqliteDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
        DatabaseDriver::Mysql => {
            let db = MysqlDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
    }
}

/// Create a SQLite in-memory database pool for testing
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
