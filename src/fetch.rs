use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use crate::models::{AggregatedScores, MediaKind, NewOffer, NewTitle};
use crate::ratings::RatingsApi;
use crate::tmdb::{TitleDetails, TmdbApi, WatchOffer};

/// Everything the three providers know about one title.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub details: TitleDetails,
    pub imdb_id: Option<String>,
    pub scores: AggregatedScores,
    pub offers: Vec<WatchOffer>,
}

/// Fans out to the metadata, ratings and streaming lookups for one title.
///
/// Metadata calls (details, external ids) are mandatory and their failures
/// propagate. Ratings and streaming are enrichment only: failures there are
/// logged and degrade to an empty result.
pub async fn fetch_aggregate(
    tmdb: &Arc<dyn TmdbApi>,
    ratings: &Arc<dyn RatingsApi>,
    tmdb_id: i64,
    kind: MediaKind,
) -> Result<Aggregate> {
    let details = tmdb.details(tmdb_id, kind).await?;
    let external = tmdb.external_ids(tmdb_id, kind).await?;

    let scores = match external.imdb_id.as_deref() {
        Some(imdb_id) => match ratings.scores_by_imdb_id(imdb_id).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!("Failed to fetch ratings for {}: {:#}", imdb_id, e);
                AggregatedScores::default()
            }
        },
        None => AggregatedScores::default(),
    };

    let offers = match tmdb.watch_providers(tmdb_id, kind).await {
        Ok(offers) => offers,
        Err(e) => {
            warn!(
                "Failed to fetch streaming offers for {} {}: {:#}",
                kind, tmdb_id, e
            );
            Vec::new()
        }
    };

    Ok(Aggregate {
        details,
        imdb_id: external.imdb_id,
        scores,
        offers,
    })
}

impl Aggregate {
    /// Shapes the aggregate into the record persisted on a cache miss. The
    /// localized title doubles as `title_pt` since lookups run with a fixed
    /// request language.
    pub fn into_record(self) -> NewTitle {
        NewTitle {
            tmdb_id: self.details.id,
            imdb_id: self.imdb_id,
            title: self.details.title.clone(),
            title_pt: Some(self.details.title),
            overview: self.details.overview,
            poster_path: self.details.poster_path,
            backdrop_path: self.details.backdrop_path,
            release_date: self.details.release_date,
            media_kind: self.details.kind,
            scores: self.scores,
            offers: self
                .offers
                .into_iter()
                .map(|o| NewOffer {
                    provider: o.provider,
                    kind: o.kind,
                    link: o.link,
                })
                .collect(),
        }
    }
}
