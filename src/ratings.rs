use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::models::AggregatedScores;

const RATINGS_BASE: &str = "https://movie-database-alternative.p.rapidapi.com/";
const RAPIDAPI_HOST: &str = "movie-database-alternative.p.rapidapi.com";

/// Client for the OMDb-compatible ratings lookup behind RapidAPI.
#[derive(Debug, Clone)]
pub struct RatingsClient {
    client: Client,
    api_key: String,
}

#[async_trait]
pub trait RatingsApi: Send + Sync {
    async fn scores_by_imdb_id(&self, imdb_id: &str) -> Result<AggregatedScores>;
}

impl RatingsClient {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("RAPIDAPI_KEY").context("RAPIDAPI_KEY not set")?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(format!("cinedex/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build ratings HTTP client")?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl RatingsApi for RatingsClient {
    async fn scores_by_imdb_id(&self, imdb_id: &str) -> Result<AggregatedScores> {
        let res = self
            .client
            .get(RATINGS_BASE)
            .query(&[("r", "json"), ("i", imdb_id)])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .send()
            .await
            .context("ratings request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading ratings body failed")?;
        if !status.is_success() {
            return Err(anyhow!(
                "ratings lookup HTTP error (status {}): {}",
                status,
                text
            ));
        }
        let payload: LookupResponse =
            serde_json::from_str(&text).context("Failed to parse ratings JSON")?;
        if payload.response == "False" {
            warn!("No ratings entry for imdb id {}", imdb_id);
            return Ok(AggregatedScores::default());
        }
        Ok(extract_scores(&payload))
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "Metascore")]
    metascore: Option<String>,
    #[serde(rename = "Ratings", default)]
    ratings: Vec<SourcedRating>,
}

#[derive(Debug, Deserialize)]
struct SourcedRating {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Value")]
    value: String,
}

// The provider reports absent values as the literal string "N/A".
fn extract_scores(payload: &LookupResponse) -> AggregatedScores {
    let imdb = payload
        .imdb_rating
        .as_deref()
        .filter(|v| *v != "N/A")
        .and_then(|v| v.parse::<f64>().ok());
    let metacritic = payload
        .metascore
        .as_deref()
        .filter(|v| *v != "N/A")
        .and_then(|v| v.parse::<i64>().ok());
    let rotten_tomatoes = payload
        .ratings
        .iter()
        .find(|r| r.source == "Rotten Tomatoes")
        .and_then(|r| parse_percent(&r.value));
    AggregatedScores {
        imdb,
        rotten_tomatoes,
        metacritic,
    }
}

fn parse_percent(value: &str) -> Option<i64> {
    value.trim().strip_suffix('%')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(imdb: &str, metascore: &str, rt: Option<&str>) -> LookupResponse {
        LookupResponse {
            response: "True".to_string(),
            imdb_rating: Some(imdb.to_string()),
            metascore: Some(metascore.to_string()),
            ratings: rt
                .map(|value| {
                    vec![SourcedRating {
                        source: "Rotten Tomatoes".to_string(),
                        value: value.to_string(),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[test]
    fn extracts_all_three_scores() {
        let scores = extract_scores(&payload("8.8", "74", Some("87%")));
        assert_eq!(scores.imdb, Some(8.8));
        assert_eq!(scores.metacritic, Some(74));
        assert_eq!(scores.rotten_tomatoes, Some(87));
    }

    #[test]
    fn not_available_fields_stay_absent() {
        let scores = extract_scores(&payload("N/A", "N/A", None));
        assert_eq!(scores, AggregatedScores::default());
    }

    #[test]
    fn malformed_percentage_is_dropped() {
        let scores = extract_scores(&payload("7.1", "N/A", Some("fresh")));
        assert_eq!(scores.imdb, Some(7.1));
        assert_eq!(scores.rotten_tomatoes, None);
    }

    #[test]
    fn other_rating_sources_are_ignored() {
        let mut payload = payload("N/A", "N/A", None);
        payload.ratings.push(SourcedRating {
            source: "Internet Movie Database".to_string(),
            value: "8.8/10".to_string(),
        });
        assert_eq!(extract_scores(&payload).rotten_tomatoes, None);
    }
}
