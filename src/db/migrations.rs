//! Database migrations module
//!
//! Code-based migrations embedded as SQL strings, with one variant per
//! supported driver so the binary carries its own schema.
//!
//! Each migration is a [`Migration`] with a unique, increasing `version`.
//! Applied versions are recorded in the `_migrations` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{backend, on_backend, Backend, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_admin_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS admin_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS admin_users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_reference_tables",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                description TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                city VARCHAR(100),
                region VARCHAR(100),
                country VARCHAR(100),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                description TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS locations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                city VARCHAR(100),
                region VARCHAR(100),
                country VARCHAR(100),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_listings",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                description TEXT NOT NULL,
                website_url VARCHAR(2048),
                contact_email VARCHAR(255) NOT NULL,
                phone VARCHAR(50),
                location_id INTEGER NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                is_featured INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (location_id) REFERENCES locations(id)
            );
            CREATE INDEX IF NOT EXISTS idx_listings_visibility ON listings(status, is_featured, created_at);
            CREATE INDEX IF NOT EXISTS idx_listings_location_id ON listings(location_id);
            CREATE TABLE IF NOT EXISTS listing_categories (
                listing_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (listing_id, category_id),
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_listing_categories_category_id ON listing_categories(category_id);
            CREATE TABLE IF NOT EXISTS listing_tags (
                listing_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (listing_id, tag_id),
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS listings (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(120) NOT NULL UNIQUE,
                name VARCHAR(200) NOT NULL,
                description TEXT NOT NULL,
                website_url VARCHAR(2048),
                contact_email VARCHAR(255) NOT NULL,
                phone VARCHAR(50),
                location_id BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                is_featured BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (location_id) REFERENCES locations(id)
            );
            CREATE INDEX idx_listings_visibility ON listings(status, is_featured, created_at);
            CREATE TABLE IF NOT EXISTS listing_categories (
                listing_id BIGINT NOT NULL,
                category_id BIGINT NOT NULL,
                PRIMARY KEY (listing_id, category_id),
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS listing_tags (
                listing_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                PRIMARY KEY (listing_id, tag_id),
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_moderation_events",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS moderation_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id INTEGER NOT NULL,
                action VARCHAR(20) NOT NULL,
                from_status VARCHAR(20) NOT NULL,
                to_status VARCHAR(20) NOT NULL,
                featured INTEGER NOT NULL,
                actor_id VARCHAR(64) NOT NULL,
                actor_email VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_moderation_events_listing_id ON moderation_events(listing_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS moderation_events (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                listing_id BIGINT NOT NULL,
                action VARCHAR(20) NOT NULL,
                from_status VARCHAR(20) NOT NULL,
                to_status VARCHAR(20) NOT NULL,
                featured BOOLEAN NOT NULL,
                actor_id VARCHAR(64) NOT NULL,
                actor_email VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_moderation_events_listing_id ON moderation_events(listing_id);
        "#,
    },
];

/// Run all pending migrations, returning how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied_versions.contains(&i64::from(migration.version)) {
            continue;
        }
        tracing::info!(
            "Applying migration {}: {}",
            migration.version,
            migration.name
        );
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    on_backend!(pool, |p| {
        sqlx::query(sql).execute(p).await?;
    });
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    const SQL: &str = "SELECT version, name, applied_at FROM _migrations ORDER BY version";

    let records = match backend(pool)? {
        Backend::Sqlite(p) => sqlx::query(SQL)
            .fetch_all(p)
            .await?
            .iter()
            .map(|row| MigrationRecord {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect(),
        Backend::Mysql(p) => sqlx::query(SQL)
            .fetch_all(p)
            .await?
            .iter()
            .map(|row| MigrationRecord {
                version: i64::from(row.get::<i32, _>("version")),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect(),
    };

    Ok(records)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    const RECORD: &str = "INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)";

    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    on_backend!(pool, |p| {
        for statement in split_sql_statements(sql) {
            sqlx::query(statement)
                .execute(p)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
        sqlx::query(RECORD)
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(p)
            .await?;
    });

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}
