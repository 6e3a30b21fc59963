//! Fetch the aggregated scores for one IMDb id and print them.
//! Usage:
//!   cargo run --bin ratings_probe -- tt1375666
//! Requires RAPIDAPI_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use cinedex::ratings::{RatingsApi, RatingsClient};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let imdb_id = env::args()
        .nth(1)
        .context("usage: ratings_probe <imdb_id>")?;

    let client = RatingsClient::from_env()?;
    let scores = client.scores_by_imdb_id(&imdb_id).await?;

    println!("scores for {imdb_id}:");
    println!("  imdb:            {:?}", scores.imdb);
    println!("  rotten tomatoes: {:?}", scores.rotten_tomatoes);
    println!("  metacritic:      {:?}", scores.metacritic);
    Ok(())
}
