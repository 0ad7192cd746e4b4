//! Slug allocation
//!
//! Derives URL-safe identifiers from display names and keeps them unique
//! within a namespace (listings, categories, locations and tags are each their
//! own namespace).
//!
//! The existence check and the insert are not atomic. The unique index on
//! each slug column is the final arbiter: [`create_unique`] treats a unique
//! violation at insert time as "taken" and moves on to the next suffix.

use crate::db::is_unique_violation;
use crate::db::repositories::{
    CategoryRepository, ListingRepository, LocationRepository, TagRepository,
};
use anyhow::Result;
use async_trait::async_trait;
use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};
use std::future::Future;

/// Longest normalized slug, before any `-N` suffix
pub const MAX_SLUG_LEN: usize = 100;

/// Inserts attempted by [`create_unique`] before giving up
pub const MAX_CREATE_ATTEMPTS: usize = 8;

/// Existence check scoped to one entity's slugs
#[async_trait]
pub trait SlugNamespace: Send + Sync {
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
}

/// Error types for slug allocation
#[derive(Debug, thiserror::Error)]
pub enum SlugError {
    /// Every attempted candidate was taken by a concurrent insert
    #[error("Could not allocate a unique slug for '{0}'")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Normalize a display name into a slug candidate.
///
/// Lowercases, drops characters other than ASCII letters, digits,
/// whitespace, `_` and `-`, collapses separator runs into one `-` and caps
/// the length. May return an empty string; see [`base_slug`].
pub fn normalize(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_separator = true;
        }
    }

    // Output is pure ASCII, so any byte index is a char boundary.
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        let trimmed = slug.trim_end_matches('-').len();
        slug.truncate(trimmed);
    }

    slug
}

/// Normalized slug, or `item-<hash>` when nothing survives normalization
pub fn base_slug(name: &str) -> String {
    let slug = normalize(name);
    if slug.is_empty() {
        let digest = Sha256::digest(name.as_bytes());
        format!("item-{}", HEXLOWER.encode(&digest[..4]))
    } else {
        slug
    }
}

fn candidate(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

/// First free candidate at or after suffix `start`, with its suffix number
async fn first_free<N>(base: &str, start: u32, namespace: &N) -> Result<(String, u32)>
where
    N: SlugNamespace + ?Sized,
{
    let mut n = start;
    loop {
        let slug = candidate(base, n);
        if !namespace.slug_exists(&slug).await? {
            return Ok((slug, n));
        }
        n += 1;
    }
}

/// Allocate a slug for `name` that is currently unused in `namespace`.
///
/// Tries the base slug, then `-2`, `-3`, and so on. Persists nothing.
pub async fn allocate<N>(name: &str, namespace: &N) -> Result<String>
where
    N: SlugNamespace + ?Sized,
{
    let (slug, _) = first_free(&base_slug(name), 1, namespace).await?;
    Ok(slug)
}

/// Allocate a slug and hand it to `create`, retrying with the next suffix
/// when the insert loses a race on the unique index.
pub async fn create_unique<N, T, F, Fut>(
    name: &str,
    namespace: &N,
    mut create: F,
) -> Result<T, SlugError>
where
    N: SlugNamespace + ?Sized,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let base = base_slug(name);
    let mut start = 1;

    for _ in 0..MAX_CREATE_ATTEMPTS {
        let (slug, n) = first_free(&base, start, namespace).await?;
        match create(slug.clone()).await {
            Ok(created) => return Ok(created),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!("Slug '{}' taken concurrently, retrying", slug);
                start = n + 1;
            }
            Err(e) => return Err(SlugError::InternalError(e)),
        }
    }

    tracing::warn!("Gave up allocating a slug for '{}'", name);
    Err(SlugError::Conflict(base))
}

macro_rules! impl_slug_namespace {
    ($($repo:ident),* $(,)?) => {
        $(
            #[async_trait]
            impl SlugNamespace for dyn $repo {
                async fn slug_exists(&self, slug: &str) -> Result<bool> {
                    $repo::slug_exists(self, slug).await
                }
            }
        )*
    };
}

impl_slug_namespace!(
    ListingRepository,
    CategoryRepository,
    LocationRepository,
    TagRepository,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{backend, create_test_pool, Backend};
    use anyhow::Context;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemoryNamespace(HashSet<String>);

    impl MemoryNamespace {
        fn with(slugs: &[&str]) -> Self {
            Self(slugs.iter().map(|s| s.to_string()).collect())
        }
    }

    #[async_trait]
    impl SlugNamespace for MemoryNamespace {
        async fn slug_exists(&self, slug: &str) -> Result<bool> {
            Ok(self.0.contains(slug))
        }
    }

    /// Namespace whose reads are always stale
    struct BlindNamespace;

    #[async_trait]
    impl SlugNamespace for BlindNamespace {
        async fn slug_exists(&self, _slug: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn is_url_safe(slug: &str) -> bool {
        !slug.is_empty()
            && !slug.starts_with('-')
            && !slug.ends_with('-')
            && !slug.contains("--")
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    #[test]
    fn test_normalize_drops_apostrophes() {
        assert_eq!(normalize("Joe's Pizza"), "joes-pizza");
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize("  Health & Wellness  "), "health-wellness");
        assert_eq!(normalize("New York, NY"), "new-york-ny");
        assert_eq!(normalize("snake_case--name"), "snake-case-name");
        assert_eq!(normalize("Sunrise Coffee Co."), "sunrise-coffee-co");
    }

    #[test]
    fn test_normalize_caps_length_without_trailing_hyphen() {
        let name = format!("{} tail", "a".repeat(MAX_SLUG_LEN - 1));
        let slug = normalize(&name);
        assert_eq!(slug.len(), MAX_SLUG_LEN - 1);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_base_slug_fallback_for_punctuation() {
        let slug = base_slug("!!!");
        assert!(slug.starts_with("item-"));
        assert_eq!(slug.len(), "item-".len() + 8);
        assert_eq!(slug, base_slug("!!!"));
        assert_ne!(slug, base_slug("???"));
        assert!(base_slug("").starts_with("item-"));
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    #[tokio::test]
    async fn test_allocate_free_candidate() {
        let ns = MemoryNamespace::with(&[]);
        assert_eq!(allocate("Foo", &ns).await.unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_allocate_skips_taken_suffixes() {
        let ns = MemoryNamespace::with(&["foo", "foo-2"]);
        assert_eq!(allocate("Foo", &ns).await.unwrap(), "foo-3");
    }

    #[tokio::test]
    async fn test_allocate_uses_first_gap() {
        let ns = MemoryNamespace::with(&["foo", "foo-3"]);
        assert_eq!(allocate("Foo", &ns).await.unwrap(), "foo-2");
    }

    #[tokio::test]
    async fn test_create_unique_retries_on_unique_violation() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let Ok(Backend::Sqlite(sqlite)) = backend(&pool) else {
            panic!("expected sqlite backend");
        };
        sqlx::query("CREATE TABLE things (slug TEXT NOT NULL UNIQUE)")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO things (slug) VALUES ('joes-pizza'), ('joes-pizza-2')")
            .execute(sqlite)
            .await
            .unwrap();

        let attempts = AtomicUsize::new(0);
        let slug = create_unique("Joe's Pizza", &BlindNamespace, |slug| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                sqlx::query("INSERT INTO things (slug) VALUES (?)")
                    .bind(&slug)
                    .execute(sqlite)
                    .await
                    .context("Failed to insert thing")?;
                Ok(slug)
            }
        })
        .await
        .unwrap();

        assert_eq!(slug, "joes-pizza-3");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_create_unique_propagates_other_errors() {
        let result: Result<(), SlugError> =
            create_unique("Foo", &BlindNamespace, |_| async { Err(anyhow::anyhow!("disk full")) })
                .await;
        assert!(matches!(result, Err(SlugError::InternalError(_))));
    }

    proptest! {
        #[test]
        fn property_base_slug_is_url_safe(name in ".{0,300}") {
            let slug = base_slug(&name);
            prop_assert!(is_url_safe(&slug), "slug {:?} from {:?}", slug, name);
            prop_assert!(slug.len() <= MAX_SLUG_LEN);
        }

        #[test]
        fn property_colliding_allocations_differ(name in "[A-Za-z ]{1,30}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let mut ns = MemoryNamespace::with(&[]);
                let first = allocate(&name, &ns).await.unwrap();
                ns.0.insert(first.clone());
                let second = allocate(&name, &ns).await.unwrap();
                prop_assert_ne!(first, second);
                Ok(())
            })?;
        }
    }
}
