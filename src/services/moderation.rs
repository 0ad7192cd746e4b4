//! Listing moderation
//!
//! The moderation state machine:
//!
//! | from      | approve  | reject   | feature             | unfeature            |
//! |-----------|----------|----------|---------------------|----------------------|
//! | Pending   | Approved | Rejected | -                   | -                    |
//! | Approved  | -        | -        | Approved, featured  | Approved, unfeatured |
//! | Rejected  | -        | -        | -                   | -                    |
//!
//! Every `-` is an [`ModerationError::InvalidTransition`]. Updates are
//! conditioned on the status read before planning, so when two moderators
//! race, the loser also gets `InvalidTransition`.

use crate::db::repositories::{ListingRepository, TransitionOutcome};
use crate::models::{Listing, ListingStatus, ModerationAction, ModerationEvent, Principal, Transition};
use anyhow::Context;
use std::sync::Arc;

/// Error types for moderation operations
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// Listing not found
    #[error("Listing not found: {0}")]
    NotFound(i64),

    /// Action not permitted from the listing's current status
    #[error("Cannot {action} a listing that is {status}")]
    InvalidTransition {
        action: ModerationAction,
        status: ListingStatus,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Plan the transition `action` makes from `listing`'s current state.
pub fn plan(listing: &Listing, action: ModerationAction) -> Result<Transition, ModerationError> {
    use ListingStatus::{Approved, Pending, Rejected};
    use ModerationAction::{Approve, Feature, Reject, Unfeature};

    let (to_status, featured) = match (listing.status, action) {
        (Pending, Approve) => (Approved, false),
        (Pending, Reject) => (Rejected, false),
        (Approved, Feature) => (Approved, true),
        (Approved, Unfeature) => (Approved, false),
        (status, action) => return Err(ModerationError::InvalidTransition { action, status }),
    };

    Ok(Transition {
        action,
        from_status: listing.status,
        to_status,
        featured,
    })
}

/// Moderation service applying actions on behalf of an administrator
pub struct ModerationService {
    listings: Arc<dyn ListingRepository>,
}

impl ModerationService {
    /// Create a new moderation service
    pub fn new(listings: Arc<dyn ListingRepository>) -> Self {
        Self { listings }
    }

    /// Apply `action` to listing `id`, returning the updated listing.
    pub async fn apply(
        &self,
        id: i64,
        action: ModerationAction,
        actor: &Principal,
    ) -> Result<Listing, ModerationError> {
        let current = self
            .listings
            .get_by_id(id)
            .await
            .context("Failed to load listing")?
            .ok_or(ModerationError::NotFound(id))?;

        let transition = plan(&current, action).inspect_err(|_| {
            tracing::warn!(
                "Rejected {} on listing {} in status {} by {}",
                action,
                id,
                current.status,
                actor.email
            );
        })?;

        let outcome = self
            .listings
            .apply_transition(id, &transition, actor)
            .await
            .context("Failed to apply transition")?;

        match outcome {
            TransitionOutcome::Applied(listing) => {
                tracing::info!(
                    "Listing {} {}: {} -> {} (featured={}) by {}",
                    id,
                    action,
                    transition.from_status,
                    listing.status,
                    listing.is_featured,
                    actor.email
                );
                Ok(listing)
            }
            TransitionOutcome::Stale(listing) => {
                tracing::warn!(
                    "Concurrent moderation on listing {}: {} expected {}, found {}",
                    id,
                    action,
                    transition.from_status,
                    listing.status
                );
                Err(ModerationError::InvalidTransition {
                    action,
                    status: listing.status,
                })
            }
            TransitionOutcome::NotFound => Err(ModerationError::NotFound(id)),
        }
    }

    /// Audit trail for listing `id`, oldest first
    pub async fn events(&self, id: i64) -> Result<Vec<ModerationEvent>, ModerationError> {
        if self.listings.get_by_id(id).await?.is_none() {
            return Err(ModerationError::NotFound(id));
        }
        Ok(self.listings.list_events(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CategoryRepository, LocationRepository, SqlxCategoryRepository, SqlxListingRepository,
        SqlxLocationRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateCategoryInput, CreateListingInput, CreateLocationInput};
    use chrono::Utc;

    fn listing_in(status: ListingStatus, featured: bool) -> Listing {
        let now = Utc::now();
        Listing {
            id: 1,
            slug: "joes-pizza".to_string(),
            name: "Joe's Pizza".to_string(),
            description: "Best pizza in town".to_string(),
            website_url: None,
            contact_email: "joe@pizza.com".to_string(),
            phone: None,
            location_id: 1,
            status,
            is_featured: featured,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (Arc<dyn ListingRepository>, ModerationService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxLocationRepository::new(pool.clone())
            .create(&CreateLocationInput::new("new-york-ny", "New York, NY"))
            .await
            .unwrap();
        SqlxCategoryRepository::new(pool.clone())
            .create(&CreateCategoryInput::new("restaurants", "Restaurants"))
            .await
            .unwrap();

        let repo = SqlxListingRepository::boxed(pool);
        (repo.clone(), ModerationService::new(repo))
    }

    async fn create_pending(repo: &Arc<dyn ListingRepository>, slug: &str) -> Listing {
        repo.create(&CreateListingInput {
            slug: slug.to_string(),
            name: slug.to_string(),
            description: "A place worth visiting".to_string(),
            website_url: None,
            contact_email: "owner@example.com".to_string(),
            phone: None,
            location_id: 1,
            category_ids: vec![1],
            tag_ids: vec![],
            status: ListingStatus::Pending,
            is_featured: false,
        })
        .await
        .unwrap()
    }

    fn admin() -> Principal {
        Principal::new("1", "admin@example.com")
    }

    // ========================================================================
    // Transition table
    // ========================================================================

    #[test]
    fn test_transition_table() {
        use ListingStatus::*;
        use ModerationAction::*;

        let allowed = [
            (Pending, Approve, Approved, false),
            (Pending, Reject, Rejected, false),
            (Approved, Feature, Approved, true),
            (Approved, Unfeature, Approved, false),
        ];

        for from in [Pending, Approved, Rejected] {
            for action in ModerationAction::ALL {
                let result = plan(&listing_in(from, false), action);
                match allowed.iter().find(|(f, a, _, _)| *f == from && *a == action) {
                    Some((_, _, to, featured)) => {
                        let t = result.unwrap_or_else(|e| panic!("{action} from {from}: {e}"));
                        assert_eq!(t.from_status, from);
                        assert_eq!(t.to_status, *to);
                        assert_eq!(t.featured, *featured);
                    }
                    None => assert!(
                        matches!(
                            result,
                            Err(ModerationError::InvalidTransition { action: a, status: s })
                                if a == action && s == from
                        ),
                        "{action} from {from} should be invalid"
                    ),
                }
            }
        }
    }

    #[test]
    fn test_unfeature_clears_flag() {
        let t = plan(&listing_in(ListingStatus::Approved, true), ModerationAction::Unfeature).unwrap();
        assert!(!t.featured);
    }

    // ========================================================================
    // Service
    // ========================================================================

    #[tokio::test]
    async fn test_approve_then_feature() {
        let (repo, service) = setup().await;
        let listing = create_pending(&repo, "joes-pizza").await;

        let approved = service
            .apply(listing.id, ModerationAction::Approve, &admin())
            .await
            .unwrap();
        assert_eq!(approved.status, ListingStatus::Approved);
        assert!(!approved.is_featured);

        let featured = service
            .apply(listing.id, ModerationAction::Feature, &admin())
            .await
            .unwrap();
        assert!(featured.is_featured);

        let events = service.events(listing.id).await.unwrap();
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![ModerationAction::Approve, ModerationAction::Feature]);
    }

    #[tokio::test]
    async fn test_double_approve_is_invalid_and_keeps_featured() {
        let (repo, service) = setup().await;
        let listing = create_pending(&repo, "twice").await;

        service
            .apply(listing.id, ModerationAction::Approve, &admin())
            .await
            .unwrap();
        service
            .apply(listing.id, ModerationAction::Feature, &admin())
            .await
            .unwrap();

        let err = service
            .apply(listing.id, ModerationAction::Approve, &admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModerationError::InvalidTransition {
                action: ModerationAction::Approve,
                status: ListingStatus::Approved
            }
        ));

        let current = repo.get_by_id(listing.id).await.unwrap().unwrap();
        assert!(current.is_featured);
        assert_eq!(current.status, ListingStatus::Approved);
    }

    #[tokio::test]
    async fn test_rejected_is_terminal() {
        let (repo, service) = setup().await;
        let listing = create_pending(&repo, "nope").await;

        service
            .apply(listing.id, ModerationAction::Reject, &admin())
            .await
            .unwrap();

        for action in ModerationAction::ALL {
            let err = service.apply(listing.id, action, &admin()).await.unwrap_err();
            assert!(matches!(err, ModerationError::InvalidTransition { .. }));
        }
        assert_eq!(service.events(listing.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_listing() {
        let (_repo, service) = setup().await;
        let err = service
            .apply(999, ModerationAction::Approve, &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound(999)));
        assert!(matches!(service.events(999).await, Err(ModerationError::NotFound(999))));
    }

    #[tokio::test]
    async fn test_concurrent_approve_and_reject_single_winner() {
        let (repo, service) = setup().await;
        let id = create_pending(&repo, "contested").await.id;
        let service = Arc::new(service);

        let a = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .apply(id, ModerationAction::Approve, &admin())
                    .await
            })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .apply(id, ModerationAction::Reject, &admin())
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ModerationError::InvalidTransition { .. }))));
        assert_eq!(service.events(id).await.unwrap().len(), 1);
    }
}
