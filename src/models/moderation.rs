//! Moderation model
//!
//! Actions an administrator can apply to a listing, and the audit record
//! written for every applied transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ListingStatus;

/// Moderation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
    Feature,
    Unfeature,
}

impl ModerationAction {
    /// All actions, in a stable order
    pub const ALL: [ModerationAction; 4] = [
        ModerationAction::Approve,
        ModerationAction::Reject,
        ModerationAction::Feature,
        ModerationAction::Unfeature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
            ModerationAction::Feature => "feature",
            ModerationAction::Unfeature => "unfeature",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Some(ModerationAction::Approve),
            "reject" => Some(ModerationAction::Reject),
            "feature" => Some(ModerationAction::Feature),
            "unfeature" => Some(ModerationAction::Unfeature),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transition to apply: the expected prior state and the resulting state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: ModerationAction,
    pub from_status: ListingStatus,
    pub to_status: ListingStatus,
    pub featured: bool,
}

/// Audit trail entry for an applied transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModerationEvent {
    pub id: i64,
    pub listing_id: i64,
    pub action: ModerationAction,
    pub from_status: ListingStatus,
    pub to_status: ListingStatus,
    /// Featured flag after the transition
    pub featured: bool,
    pub actor_id: String,
    pub actor_email: String,
    pub created_at: DateTime<Utc>,
}
