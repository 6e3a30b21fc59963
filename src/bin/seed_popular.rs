//! Populate the database with popular movies and TV shows.
//! Usage:
//!   cargo run --bin seed_popular
//!   cargo run --bin seed_popular -- --movies 50 --tv 30
//! Requires TMDB_ACCESS_TOKEN and RAPIDAPI_KEY in the environment
//! (.env supported). Not part of the request-serving path.

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cinedex::ratings::{RatingsApi, RatingsClient};
use cinedex::seed::{self, SeedConfig};
use cinedex::store::Store;
use cinedex::tmdb::{TmdbApi, TmdbClient};

#[derive(Parser, Debug)]
#[command(about = "Populate the local cache with popular movies and TV shows")]
struct Args {
    /// Number of popular movies to ingest
    #[arg(long, default_value_t = 100)]
    movies: usize,
    /// Number of popular TV shows to ingest
    #[arg(long, default_value_t = 100)]
    tv: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    init_tracing();
    let args = Args::parse();

    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let ratings: Arc<dyn RatingsApi> = Arc::new(RatingsClient::from_env()?);
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/cinedex.db".to_string());
    let store = Store::connect(&database_url).await?;

    let config = SeedConfig {
        movies: args.movies,
        tv: args.tv,
        ..SeedConfig::default()
    };
    info!(
        "Seeding {} movies and {} TV shows (item delay {:?})",
        config.movies, config.tv, config.item_delay
    );

    let report = seed::run(&store, &tmdb, &ratings, &config).await?;
    seed::log_report(&report);
    Ok(())
}
