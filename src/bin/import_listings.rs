//! Bulk listing import from CSV
//!
//! ```text
//! import-listings listings.csv
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bizdir::{
    config::Config,
    db::{
        self,
        repositories::{SqlxCategoryRepository, SqlxListingRepository, SqlxLocationRepository},
    },
    services::import::Importer,
};

/// Import listings from a CSV file
#[derive(Parser)]
#[command(name = "import-listings")]
#[command(version)]
struct Cli {
    /// CSV file with a
    /// `name,description,websiteUrl,contactEmail,phone,locationName,categoryNames,status,isFeatured`
    /// header
    file: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizdir=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load_with_env(&cli.config)?;

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let importer = Importer::new(
        SqlxListingRepository::boxed(pool.clone()),
        SqlxCategoryRepository::boxed(pool.clone()),
        SqlxLocationRepository::boxed(pool.clone()),
    );

    tracing::info!("Importing listings from {}", cli.file.display());
    let summary = importer.import_path(&cli.file).await?;

    for failure in &summary.failures {
        tracing::error!(
            "Line {} ({}): {}",
            failure.line,
            if failure.name.is_empty() { "-" } else { failure.name.as_str() },
            failure.reason
        );
    }
    tracing::info!(
        "Import summary: {} imported, {} failed, {} processed",
        summary.imported.len(),
        summary.failures.len(),
        summary.total()
    );

    pool.close().await;
    Ok(())
}
