//! Administrative account model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted administrator account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    /// Unique identifier
    pub id: i64,
    /// Login email, unique
    pub email: String,
    /// Argon2 PHC string, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}
