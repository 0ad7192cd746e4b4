//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a specific entity.

pub mod admin_user;
pub mod category;
pub mod listing;
pub mod location;
pub mod tag;

pub use admin_user::{AdminUserRepository, SqlxAdminUserRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use listing::{ListingRepository, SqlxListingRepository, TransitionOutcome};
pub use location::{LocationRepository, SqlxLocationRepository};
pub use tag::{SqlxTagRepository, TagRepository};
