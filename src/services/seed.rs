//! Database seeding
//!
//! Populates a fresh database with an admin account, the default reference
//! data and, optionally, a set of sample listings. Every step is a
//! find-or-create, so running the seed twice changes nothing.

use crate::db::repositories::{
    AdminUserRepository, CategoryRepository, ListingRepository, LocationRepository, TagRepository,
};
use crate::models::{
    Category, CreateCategoryInput, CreateListingInput, CreateLocationInput, ListingStatus,
    Location, Tag,
};
use crate::services::password::hash_password;
use crate::services::slug::base_slug;
use anyhow::{Context, Result};
use std::sync::Arc;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme123";

pub const DEFAULT_CATEGORIES: [&str; 10] = [
    "Restaurants",
    "Coffee Shops",
    "Retail Stores",
    "Services",
    "Health & Wellness",
    "Entertainment",
    "Education",
    "Professional Services",
    "Home Services",
    "Automotive",
];

/// `(name, city, region, country)`
pub const DEFAULT_LOCATIONS: [(&str, &str, &str, &str); 10] = [
    ("New York, NY", "New York", "NY", "USA"),
    ("Los Angeles, CA", "Los Angeles", "CA", "USA"),
    ("Chicago, IL", "Chicago", "IL", "USA"),
    ("Houston, TX", "Houston", "TX", "USA"),
    ("Phoenix, AZ", "Phoenix", "AZ", "USA"),
    ("Philadelphia, PA", "Philadelphia", "PA", "USA"),
    ("San Antonio, TX", "San Antonio", "TX", "USA"),
    ("San Diego, CA", "San Diego", "CA", "USA"),
    ("Dallas, TX", "Dallas", "TX", "USA"),
    ("Austin, TX", "Austin", "TX", "USA"),
];

pub const DEFAULT_TAGS: [&str; 10] = [
    "Family Friendly",
    "Pet Friendly",
    "Outdoor Seating",
    "Delivery Available",
    "Parking Available",
    "WiFi Available",
    "Wheelchair Accessible",
    "Open Late",
    "Budget Friendly",
    "Luxury",
];

struct SampleListing {
    name: &'static str,
    description: &'static str,
    website_url: &'static str,
    contact_email: &'static str,
    phone: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
}

const SAMPLE_LISTINGS: [SampleListing; 5] = [
    SampleListing {
        name: "The Urban Bistro",
        description: "A modern bistro offering farm-to-table cuisine in the heart of downtown. \
                      Our seasonal menu features locally sourced ingredients.",
        website_url: "https://example.com/urban-bistro",
        contact_email: "info@urbanbistro.com",
        phone: "5551234567",
        category: "Restaurants",
        tags: &["Family Friendly", "Outdoor Seating", "Parking Available"],
    },
    SampleListing {
        name: "Sunrise Coffee Co.",
        description: "Your neighborhood coffee shop serving artisanal espresso drinks and \
                      fresh pastries. We roast our own beans.",
        website_url: "https://example.com/sunrise-coffee",
        contact_email: "hello@sunrisecoffee.com",
        phone: "5552345678",
        category: "Coffee Shops",
        tags: &["WiFi Available", "Outdoor Seating", "Open Late"],
    },
    SampleListing {
        name: "Style & Thread Boutique",
        description: "Curated fashion boutique featuring independent designers and \
                      sustainable brands.",
        website_url: "https://example.com/style-thread",
        contact_email: "shop@stylethread.com",
        phone: "5553456789",
        category: "Retail Stores",
        tags: &["Parking Available", "Wheelchair Accessible"],
    },
    SampleListing {
        name: "Green Leaf Wellness Center",
        description: "Holistic wellness center offering yoga classes, meditation sessions, \
                      massage therapy and nutrition counseling.",
        website_url: "https://example.com/greenleaf",
        contact_email: "info@greenleafwellness.com",
        phone: "5554567890",
        category: "Health & Wellness",
        tags: &["Parking Available", "Wheelchair Accessible"],
    },
    SampleListing {
        name: "TechFix Solutions",
        description: "Professional IT services and computer repair for businesses and \
                      individuals.",
        website_url: "https://example.com/techfix",
        contact_email: "support@techfixsolutions.com",
        phone: "5555678901",
        category: "Professional Services",
        tags: &[],
    },
];

/// `(name, description, location index, category index)`
const PENDING_SAMPLES: [(&str, &str, usize, usize); 2] = [
    (
        "New Restaurant Submission",
        "This is a pending listing awaiting approval.",
        0,
        0,
    ),
    (
        "Pending Coffee Shop",
        "Another pending listing for review.",
        1,
        1,
    ),
];

/// What to seed
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub admin_email: String,
    pub admin_password: String,
    /// Also create sample listings
    pub sample_listings: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            sample_listings: false,
        }
    }
}

/// Counts of rows present after seeding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub locations: usize,
    pub tags: usize,
    /// Sample listings created by this run
    pub listings_created: usize,
}

/// Database seeder
pub struct Seeder {
    admins: Arc<dyn AdminUserRepository>,
    categories: Arc<dyn CategoryRepository>,
    locations: Arc<dyn LocationRepository>,
    tags: Arc<dyn TagRepository>,
    listings: Arc<dyn ListingRepository>,
}

impl Seeder {
    pub fn new(
        admins: Arc<dyn AdminUserRepository>,
        categories: Arc<dyn CategoryRepository>,
        locations: Arc<dyn LocationRepository>,
        tags: Arc<dyn TagRepository>,
        listings: Arc<dyn ListingRepository>,
    ) -> Self {
        Self {
            admins,
            categories,
            locations,
            tags,
            listings,
        }
    }

    /// Run the seed
    pub async fn run(&self, options: &SeedOptions) -> Result<SeedSummary> {
        let hash = hash_password(&options.admin_password)?;
        let admin = self
            .admins
            .find_or_create_by_email(&options.admin_email, &hash)
            .await
            .context("Failed to seed admin user")?;
        tracing::info!("Admin user ready: {}", admin.email);

        let mut categories = Vec::with_capacity(DEFAULT_CATEGORIES.len());
        for name in DEFAULT_CATEGORIES {
            let input = CreateCategoryInput::new(base_slug(name), name);
            categories.push(self.categories.find_or_create_by_slug(&input).await?);
        }

        let mut locations = Vec::with_capacity(DEFAULT_LOCATIONS.len());
        for (name, city, region, country) in DEFAULT_LOCATIONS {
            let input =
                CreateLocationInput::new(base_slug(name), name).with_place(city, region, country);
            locations.push(self.locations.find_or_create_by_slug(&input).await?);
        }

        let mut tags = Vec::with_capacity(DEFAULT_TAGS.len());
        for name in DEFAULT_TAGS {
            tags.push(self.tags.find_or_create_by_slug(&base_slug(name), name).await?);
        }

        tracing::info!(
            "Reference data ready: {} categories, {} locations, {} tags",
            categories.len(),
            locations.len(),
            tags.len()
        );

        let listings_created = if options.sample_listings {
            self.seed_listings(&categories, &locations, &tags).await?
        } else {
            0
        };

        Ok(SeedSummary {
            categories: categories.len(),
            locations: locations.len(),
            tags: tags.len(),
            listings_created,
        })
    }

    async fn seed_listings(
        &self,
        categories: &[Category],
        locations: &[Location],
        tags: &[Tag],
    ) -> Result<usize> {
        let category_id = |name: &str| categories.iter().find(|c| c.name == name).map(|c| c.id);
        let tag_id = |name: &str| tags.iter().find(|t| t.name == name).map(|t| t.id);

        let mut created = 0;
        let mut ordinal = 0usize;

        for location in locations {
            let city = location.city.as_deref().unwrap_or(&location.name);
            for sample in &SAMPLE_LISTINGS {
                ordinal += 1;
                let name = format!("{} - {}", sample.name, city);
                let input = CreateListingInput {
                    slug: base_slug(&name),
                    name,
                    description: sample.description.to_string(),
                    website_url: Some(sample.website_url.to_string()),
                    contact_email: sample.contact_email.to_string(),
                    phone: Some(sample.phone.to_string()),
                    location_id: location.id,
                    category_ids: category_id(sample.category).into_iter().collect(),
                    tag_ids: sample.tags.iter().filter_map(|t| tag_id(t)).collect(),
                    status: ListingStatus::Approved,
                    is_featured: ordinal % 4 == 0,
                };
                if self.create_if_absent(&input).await? {
                    created += 1;
                }
            }
        }

        for (name, description, location, category) in PENDING_SAMPLES {
            let (Some(location), Some(category)) = (locations.get(location), categories.get(category))
            else {
                continue;
            };
            let input = CreateListingInput {
                slug: base_slug(name),
                name: name.to_string(),
                description: description.to_string(),
                website_url: None,
                contact_email: "pending@example.com".to_string(),
                phone: None,
                location_id: location.id,
                category_ids: vec![category.id],
                tag_ids: vec![],
                status: ListingStatus::Pending,
                is_featured: false,
            };
            if self.create_if_absent(&input).await? {
                created += 1;
            }
        }

        tracing::info!("Created {} sample listings", created);
        Ok(created)
    }

    async fn create_if_absent(&self, input: &CreateListingInput) -> Result<bool> {
        if self.listings.slug_exists(&input.slug).await? {
            return Ok(false);
        }
        self.listings
            .create(input)
            .await
            .with_context(|| format!("Failed to create sample listing '{}'", input.name))?;
        Ok(true)
    }
}
