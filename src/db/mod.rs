//! Database layer
//!
//! Persistence for the directory: SQLite by default, MySQL for larger
//! deployments. The driver is selected by configuration and hidden behind
//! [`DatabasePool`].
//!
//! # Usage
//!
//! ```ignore
//! use bizdir::config::DatabaseConfig;
//! use bizdir::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

use anyhow::{anyhow, Result};
use sqlx::{MySqlPool, SqlitePool};

use crate::config::DatabaseDriver;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Typed view of a [`DatabasePool`], used by repositories to dispatch queries.
pub enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

/// Resolve the typed pool behind a [`DynDatabasePool`].
pub fn backend(pool: &DynDatabasePool) -> Result<Backend<'_>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => pool
            .as_sqlite()
            .map(Backend::Sqlite)
            .ok_or_else(|| anyhow!("SQLite driver without a SQLite pool")),
        DatabaseDriver::Mysql => pool
            .as_mysql()
            .map(Backend::Mysql)
            .ok_or_else(|| anyhow!("MySQL driver without a MySQL pool")),
    }
}

/// Evaluate `$body` against whichever typed pool backs `$pool`.
///
/// The body is expanded once per driver, so it must only use SQL and column
/// types both drivers understand. Code that differs per driver (insert ids)
/// matches on [`Backend`] directly.
macro_rules! on_backend {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $crate::db::backend($pool)? {
            $crate::db::Backend::Sqlite($p) => $body,
            $crate::db::Backend::Mysql($p) => $body,
        }
    };
}
pub(crate) use on_backend;

/// Whether an error chain bottoms out in a unique-constraint violation.
///
/// Repositories wrap driver errors with `anyhow` context; the original
/// `sqlx::Error` is still reachable through the chain.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    })
}
