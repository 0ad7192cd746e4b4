//! Configuration management
//!
//! This module handles loading and parsing configuration for the directory service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "BIZDIR_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Admin authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/directory.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Admin authentication configuration.
///
/// The override pair lets an operator log in without an `admin_users` row.
/// Both halves must be present for the override to be active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Operator override email
    #[serde(default)]
    pub override_email: Option<String>,
    /// Operator override password (plaintext, from the deployment environment)
    #[serde(default)]
    pub override_password: Option<String>,
    /// HMAC key for session tokens; a random key is generated when absent
    #[serde(default)]
    pub signing_key: Option<String>,
    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub cookie_secure: bool,
    /// Session lifetime in days, 1..=[`MAX_SESSION_DAYS`]
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            override_email: None,
            override_password: None,
            signing_key: None,
            cookie_secure: false,
            session_days: default_session_days(),
        }
    }
}

/// Longest accepted session lifetime
pub const MAX_SESSION_DAYS: i64 = 365;

fn default_session_days() -> i64 {
    7
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - BIZDIR_SERVER_HOST, BIZDIR_SERVER_PORT, BIZDIR_SERVER_CORS_ORIGIN
    /// - BIZDIR_DATABASE_DRIVER, BIZDIR_DATABASE_URL
    /// - BIZDIR_ADMIN_EMAIL, BIZDIR_ADMIN_PASSWORD
    /// - BIZDIR_AUTH_SIGNING_KEY, BIZDIR_AUTH_COOKIE_SECURE, BIZDIR_AUTH_SESSION_DAYS
    pub fn load_with_env(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    ///
    /// Keys are given without the `BIZDIR_` prefix. Values that fail to parse
    /// are ignored and the existing setting is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        // Server configuration
        if let Some(host) = var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("SERVER_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(cors_origin) = var("SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Some(driver) = var("DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }

        // Auth configuration
        if let Some(email) = var("ADMIN_EMAIL").filter(|v| !v.is_empty()) {
            self.auth.override_email = Some(email);
        }
        if let Some(password) = var("ADMIN_PASSWORD").filter(|v| !v.is_empty()) {
            self.auth.override_password = Some(password);
        }
        if let Some(key) = var("AUTH_SIGNING_KEY").filter(|v| !v.is_empty()) {
            self.auth.signing_key = Some(key);
        }
        if let Some(secure) = var("AUTH_COOKIE_SECURE").and_then(|v| parse_bool(&v)) {
            self.auth.cookie_secure = secure;
        }
        if let Some(days) = var("AUTH_SESSION_DAYS")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|d| (1..=MAX_SESSION_DAYS).contains(d))
        {
            self.auth.session_days = days;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            "[a-z][a-z0-9]{0,10}",
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
            any::<bool>(),
            1i64..=90,
        )
            .prop_map(|(host, port, driver, override_email, cookie_secure, session_days)| Config {
                server: ServerConfig {
                    host,
                    port,
                    cors_origin: default_cors_origin(),
                },
                database: DatabaseConfig {
                    driver,
                    url: default_database_url(),
                },
                auth: AuthConfig {
                    override_email,
                    override_password: None,
                    signing_key: None,
                    cookie_secure,
                    session_days,
                },
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config to YAML and loading it back yields the same settings.
        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.auth.override_email, parsed.auth.override_email);
            prop_assert_eq!(config.auth.cookie_secure, parsed.auth.cookie_secure);
            prop_assert_eq!(config.auth.session_days, parsed.auth.session_days);
        }
    }
}
