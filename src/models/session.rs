//! Session model
//!
//! Sessions are never persisted. They exist only as the claims of a signed
//! token carried in the `session` cookie.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Principal id used for the configured override credential
pub const OVERRIDE_PRINCIPAL_ID: &str = "override";

/// An authenticated administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Admin user id, or [`OVERRIDE_PRINCIPAL_ID`]
    pub id: String,
    pub email: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// A verified session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub principal: Principal,
    /// Issue timestamp
    pub issued_at: DateTime<Utc>,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired as of `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
