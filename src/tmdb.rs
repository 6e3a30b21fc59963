use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::models::{MediaKind, OfferKind, TitleSummary};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const DEFAULT_LANGUAGE: &str = "pt-BR";
const DEFAULT_WATCH_REGION: &str = "BR";

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    access_token: String,
    language: String,
    watch_region: String,
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn search_multi(&self, query: &str) -> Result<Vec<TitleSummary>>;
    async fn details(&self, id: i64, kind: MediaKind) -> Result<TitleDetails>;
    async fn external_ids(&self, id: i64, kind: MediaKind) -> Result<ExternalIds>;
    async fn watch_providers(&self, id: i64, kind: MediaKind) -> Result<Vec<WatchOffer>>;
    async fn popular(&self, kind: MediaKind, page: u32) -> Result<Vec<PopularEntry>>;
}

#[derive(Debug, Clone)]
pub struct TitleDetails {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub kind: MediaKind,
}

#[derive(Debug, Clone)]
pub struct ExternalIds {
    pub imdb_id: Option<String>,
}

/// One watch option in the configured region.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOffer {
    pub provider: String,
    pub kind: OfferKind,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PopularEntry {
    pub id: i64,
}

impl TmdbClient {
    pub fn from_env() -> Result<Self> {
        let access_token = env::var("TMDB_ACCESS_TOKEN").context("TMDB_ACCESS_TOKEN not set")?;
        let language = env::var("TMDB_LANGUAGE").unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string());
        let watch_region =
            env::var("WATCH_REGION").unwrap_or_else(|_| DEFAULT_WATCH_REGION.to_string());
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(format!("cinedex/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            access_token,
            language,
            watch_region,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn search_multi(&self, query: &str) -> Result<Vec<TitleSummary>> {
        let url = format!(
            "{TMDB_BASE}/search/multi?query={}&language={}&include_adult=false&page=1",
            urlencoding::encode(query),
            self.language
        );
        let data: SearchResponse = self.get_json(&url).await?;
        Ok(data
            .results
            .into_iter()
            .filter_map(summary_from_multi)
            .collect())
    }

    async fn details(&self, id: i64, kind: MediaKind) -> Result<TitleDetails> {
        let url = format!(
            "{TMDB_BASE}/{}/{id}?language={}",
            kind.as_str(),
            self.language
        );
        let detail: DetailResponse = self.get_json(&url).await?;
        Ok(details_from_response(detail, kind))
    }

    async fn external_ids(&self, id: i64, kind: MediaKind) -> Result<ExternalIds> {
        let url = format!("{TMDB_BASE}/{}/{id}/external_ids", kind.as_str());
        let ids: ExternalIdsResponse = self.get_json(&url).await?;
        Ok(ExternalIds {
            imdb_id: ids.imdb_id.filter(|v| !v.is_empty()),
        })
    }

    async fn watch_providers(&self, id: i64, kind: MediaKind) -> Result<Vec<WatchOffer>> {
        let url = format!("{TMDB_BASE}/{}/{id}/watch/providers", kind.as_str());
        let data: WatchProvidersResponse = self.get_json(&url).await?;
        let region = data
            .results
            .unwrap_or_default()
            .remove(&self.watch_region);
        Ok(region.map(offers_from_region).unwrap_or_default())
    }

    async fn popular(&self, kind: MediaKind, page: u32) -> Result<Vec<PopularEntry>> {
        let url = format!(
            "{TMDB_BASE}/{}/popular?language={}&page={page}",
            kind.as_str(),
            self.language
        );
        let data: PopularResponse = self.get_json(&url).await?;
        Ok(data
            .results
            .into_iter()
            .map(|r| PopularEntry { id: r.id })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<MultiResult>,
}

#[derive(Debug, Deserialize)]
struct MultiResult {
    id: i64,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    original_title: Option<String>,
    original_name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    vote_count: i64,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIdsResponse {
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WatchProvidersResponse {
    results: Option<HashMap<String, RegionOffers>>,
}

#[derive(Debug, Deserialize)]
struct RegionOffers {
    link: Option<String>,
    flatrate: Option<Vec<ProviderEntry>>,
    rent: Option<Vec<ProviderEntry>>,
    buy: Option<Vec<ProviderEntry>>,
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    provider_name: String,
}

#[derive(Debug, Deserialize)]
struct PopularResponse {
    results: Vec<PopularResult>,
}

#[derive(Debug, Deserialize)]
struct PopularResult {
    id: i64,
}

fn summary_from_multi(item: MultiResult) -> Option<TitleSummary> {
    let kind = match item.media_type.as_deref() {
        Some("movie") => MediaKind::Movie,
        Some("tv") => MediaKind::Tv,
        _ => return None,
    };
    Some(TitleSummary {
        id: item.id,
        title: item.title.or(item.name).unwrap_or_default(),
        original_title: item.original_title.or(item.original_name),
        overview: item.overview,
        poster_path: item.poster_path,
        backdrop_path: item.backdrop_path,
        release_date: item
            .release_date
            .or(item.first_air_date)
            .filter(|d| !d.is_empty()),
        media_type: kind,
        rating: item.vote_average,
        vote_count: item.vote_count,
    })
}

fn details_from_response(detail: DetailResponse, kind: MediaKind) -> TitleDetails {
    TitleDetails {
        id: detail.id,
        title: detail.title.or(detail.name).unwrap_or_default(),
        overview: detail.overview.filter(|o| !o.is_empty()),
        poster_path: detail.poster_path,
        backdrop_path: detail.backdrop_path,
        release_date: parse_release_date(detail.release_date.or(detail.first_air_date).as_deref()),
        kind,
    }
}

fn parse_release_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.filter(|d| !d.is_empty())
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn offers_from_region(region: RegionOffers) -> Vec<WatchOffer> {
    let link = region.link;
    let mut offers = Vec::new();
    let mut push = |entries: Option<Vec<ProviderEntry>>, kind: OfferKind| {
        for entry in entries.unwrap_or_default() {
            offers.push(WatchOffer {
                provider: entry.provider_name,
                kind,
                link: link.clone(),
            });
        }
    };
    push(region.flatrate, OfferKind::Subscription);
    push(region.rent, OfferKind::Rent);
    push(region.buy, OfferKind::Buy);
    offers
}
