use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cache;
use crate::models::MediaKind;
use crate::ratings::RatingsApi;
use crate::store::Store;
use crate::tmdb::{PopularEntry, TmdbApi};

// The popular listings return 20 results per page.
const RESULTS_PER_PAGE: usize = 20;

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub movies: usize,
    pub tv: usize,
    /// Pause between processed items, to stay under provider rate limits.
    pub item_delay: Duration,
    /// Pause between popular-listing pages.
    pub page_delay: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            movies: 100,
            tv: 100,
            item_delay: Duration::from_millis(1000),
            page_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KindStats {
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SeedReport {
    pub movies: KindStats,
    pub tv: KindStats,
}

/// Walks the popular listings for both media kinds and runs the regular
/// fetch-and-persist flow for every title not already stored.
pub async fn run(
    store: &Store,
    tmdb: &Arc<dyn TmdbApi>,
    ratings: &Arc<dyn RatingsApi>,
    config: &SeedConfig,
) -> Result<SeedReport> {
    let movies = seed_kind(store, tmdb, ratings, MediaKind::Movie, config.movies, config).await?;
    let tv = seed_kind(store, tmdb, ratings, MediaKind::Tv, config.tv, config).await?;
    Ok(SeedReport { movies, tv })
}

async fn seed_kind(
    store: &Store,
    tmdb: &Arc<dyn TmdbApi>,
    ratings: &Arc<dyn RatingsApi>,
    kind: MediaKind,
    count: usize,
    config: &SeedConfig,
) -> Result<KindStats> {
    if count == 0 {
        return Ok(KindStats::default());
    }

    let entries = fetch_popular(tmdb, kind, count, config.page_delay).await?;
    info!("Processing {} popular {} entries", entries.len(), kind);

    let mut stats = KindStats::default();
    let total = entries.len();
    for (index, entry) in entries.iter().enumerate() {
        stats.total += 1;
        match seed_one(store, tmdb, ratings, entry.id, kind).await {
            Ok(Some(title)) => {
                stats.created += 1;
                info!("[{}/{}] Stored {} '{}'", index + 1, total, kind, title.title);
            }
            Ok(None) => {
                stats.skipped += 1;
                info!(
                    "[{}/{}] {} {} already stored, skipping",
                    index + 1,
                    total,
                    kind,
                    entry.id
                );
            }
            Err(e) => {
                stats.failed += 1;
                warn!(
                    "[{}/{}] Failed to seed {} {}: {:#}",
                    index + 1,
                    total,
                    kind,
                    entry.id,
                    e
                );
            }
        }
        if index + 1 < total {
            sleep(config.item_delay).await;
        }
    }
    Ok(stats)
}

/// Pages through the popular listing until `count` entries are collected.
/// A listing failure is fatal to the run; per-item failures are not.
async fn fetch_popular(
    tmdb: &Arc<dyn TmdbApi>,
    kind: MediaKind,
    count: usize,
    page_delay: Duration,
) -> Result<Vec<PopularEntry>> {
    let pages = count.div_ceil(RESULTS_PER_PAGE);
    let mut entries = Vec::new();
    for page in 1..=pages {
        entries.extend(tmdb.popular(kind, page as u32).await?);
        if page < pages {
            sleep(page_delay).await;
        }
    }
    entries.truncate(count);
    Ok(entries)
}

async fn seed_one(
    store: &Store,
    tmdb: &Arc<dyn TmdbApi>,
    ratings: &Arc<dyn RatingsApi>,
    tmdb_id: i64,
    kind: MediaKind,
) -> Result<Option<crate::models::StoredTitle>> {
    if store.find_title(tmdb_id).await?.is_some() {
        return Ok(None);
    }
    let title = cache::fetch_and_persist(store, tmdb, ratings, tmdb_id, kind).await?;
    Ok(Some(title))
}

pub fn log_report(report: &SeedReport) {
    for (label, stats) in [("movies", report.movies), ("tv", report.tv)] {
        info!(
            "{}: {} processed, {} created, {} skipped, {} failed",
            label, stats.total, stats.created, stats.skipped, stats.failed
        );
    }
    info!(
        "Seeding finished: {} titles added",
        report.movies.created + report.tv.created
    );
}
