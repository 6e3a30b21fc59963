use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            _ => Err(anyhow::anyhow!("media kind must be 'movie' or 'tv'")),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    Subscription,
    Rent,
    Buy,
    Free,
    Addon,
}

impl OfferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferKind::Subscription => "subscription",
            OfferKind::Rent => "rent",
            OfferKind::Buy => "buy",
            OfferKind::Free => "free",
            OfferKind::Addon => "addon",
        }
    }
}

impl FromStr for OfferKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "subscription" => Ok(OfferKind::Subscription),
            "rent" => Ok(OfferKind::Rent),
            "buy" => Ok(OfferKind::Buy),
            "free" => Ok(OfferKind::Free),
            "addon" => Ok(OfferKind::Addon),
            other => Err(anyhow::anyhow!("unknown offer kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleSummary {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub media_type: MediaKind,
    pub rating: f64,
    pub vote_count: i64,
}

/// Scores aggregated from the ratings provider, each independently optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedScores {
    pub imdb: Option<f64>,
    pub rotten_tomatoes: Option<i64>,
    pub metacritic: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSnapshot {
    pub scores: AggregatedScores,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamingOffer {
    pub provider: String,
    pub kind: OfferKind,
    pub link: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A title as read back from storage, with its latest rating snapshot and
/// the offers currently marked available.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTitle {
    pub id: i64,
    pub tmdb_id: i64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub title_pt: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub media_kind: MediaKind,
    pub rating: Option<RatingSnapshot>,
    pub offers: Vec<StreamingOffer>,
}

/// Everything needed to create a title together with its first rating
/// snapshot and streaming offers.
#[derive(Debug, Clone)]
pub struct NewTitle {
    pub tmdb_id: i64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub title_pt: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub media_kind: MediaKind,
    pub scores: AggregatedScores,
    pub offers: Vec<NewOffer>,
}

#[derive(Debug, Clone)]
pub struct NewOffer {
    pub provider: String,
    pub kind: OfferKind,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleDetailResponse {
    pub id: i64,
    pub tmdb_id: i64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub title_pt: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub media_type: MediaKind,
    pub ratings: AggregatedScores,
    pub streaming_options: Vec<OfferResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub provider: String,
    #[serde(rename = "type")]
    pub kind: OfferKind,
    pub link: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<StoredTitle> for TitleDetailResponse {
    fn from(title: StoredTitle) -> Self {
        TitleDetailResponse {
            id: title.id,
            tmdb_id: title.tmdb_id,
            imdb_id: title.imdb_id,
            title: title.title,
            title_pt: title.title_pt,
            overview: title.overview,
            poster_path: title.poster_path,
            backdrop_path: title.backdrop_path,
            release_date: title.release_date,
            media_type: title.media_kind,
            ratings: title.rating.map(|r| r.scores).unwrap_or_default(),
            streaming_options: title
                .offers
                .into_iter()
                .map(|o| OfferResponse {
                    provider: o.provider,
                    kind: o.kind,
                    link: o.link,
                    recorded_at: o.recorded_at,
                })
                .collect(),
        }
    }
}
