//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules (validation, moderation, slugs)
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod auth;
pub mod import;
pub mod listing;
pub mod moderation;
pub mod password;
pub mod seed;
pub mod slug;

pub use auth::{AuthError, AuthSettings, Authenticator};
pub use import::{ImportError, ImportSummary, Importer};
pub use listing::{ListingService, ListingServiceError, SubmitListingInput};
pub use moderation::{ModerationError, ModerationService};
pub use password::{hash_password, verify_password};
pub use seed::{SeedOptions, Seeder};
pub use slug::SlugError;
