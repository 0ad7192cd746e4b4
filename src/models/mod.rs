//! Data models
//!
//! Data structures shared by the repositories, services and API:
//! - Database entities (Listing, Category, Location, Tag, AdminUser, ModerationEvent)
//! - Session claims (never persisted)
//! - Input and query types

mod admin_user;
mod category;
mod listing;
mod location;
mod moderation;
mod session;
mod tag;

pub use admin_user::AdminUser;
pub use category::{Category, CreateCategoryInput};
pub use listing::{
    CreateListingInput, Listing, ListingDetail, ListingQuery, ListingStatus, PageParams,
    PagedResult, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use location::{CreateLocationInput, Location};
pub use moderation::{ModerationAction, ModerationEvent, Transition};
pub use session::{Principal, Session, OVERRIDE_PRINCIPAL_ID};
pub use tag::Tag;
