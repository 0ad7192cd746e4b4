//! Bizdir - A moderated business directory

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bizdir::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAdminUserRepository, SqlxCategoryRepository, SqlxListingRepository,
            SqlxLocationRepository, SqlxTagRepository,
        },
        DynDatabasePool,
    },
    services::{
        auth::AuthSettings,
        seed::{SeedOptions, Seeder},
    },
};

/// Business directory server
#[derive(Parser)]
#[command(name = "bizdir")]
#[command(about = "bizdir - A moderated business directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Create the admin account and default reference data
    Seed {
        /// Also create sample listings
        #[arg(long)]
        samples: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizdir=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_with_env(&cli.config)?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, pool).await,
        Commands::Seed { samples } => seed(&config, pool, samples).await,
    }
}

async fn serve(config: Config, pool: DynDatabasePool) -> Result<()> {
    let state = AppState::new(pool, AuthSettings::from_config(&config.auth));
    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn seed(config: &Config, pool: DynDatabasePool, samples: bool) -> Result<()> {
    let mut options = SeedOptions {
        sample_listings: samples,
        ..Default::default()
    };
    if let (Some(email), Some(password)) = (
        config.auth.override_email.as_ref(),
        config.auth.override_password.as_ref(),
    ) {
        options.admin_email = email.clone();
        options.admin_password = password.clone();
    }

    let seeder = Seeder::new(
        SqlxAdminUserRepository::boxed(pool.clone()),
        SqlxCategoryRepository::boxed(pool.clone()),
        SqlxLocationRepository::boxed(pool.clone()),
        SqlxTagRepository::boxed(pool.clone()),
        SqlxListingRepository::boxed(pool.clone()),
    );
    let summary = seeder.run(&options).await?;

    tracing::info!(
        "Seed completed: {} categories, {} locations, {} tags, {} new listings, admin {}",
        summary.categories,
        summary.locations,
        summary.tags,
        summary.listings_created,
        options.admin_email
    );

    pool.close().await;
    Ok(())
}
