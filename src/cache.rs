use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::fetch;
use crate::models::{MediaKind, StoredTitle};
use crate::ratings::RatingsApi;
use crate::store::{InsertOutcome, Store};
use crate::tmdb::TmdbApi;

/// Read-through lookup: return the stored record, or on a miss fetch from
/// the providers, persist, and return the result.
///
/// Stored records are returned as-is; there is no freshness check. Two
/// concurrent misses for the same id may both hit the providers, but the
/// uniqueness constraint on `tmdb_id` guarantees a single insert wins; the
/// loser drops its fetched data and re-reads.
pub async fn get_or_fetch(
    store: &Store,
    tmdb: &Arc<dyn TmdbApi>,
    ratings: &Arc<dyn RatingsApi>,
    tmdb_id: i64,
    kind: MediaKind,
) -> Result<StoredTitle> {
    if let Some(existing) = store.find_title(tmdb_id).await? {
        debug!("Serving {} {} from store", kind, tmdb_id);
        return Ok(existing);
    }
    fetch_and_persist(store, tmdb, ratings, tmdb_id, kind).await
}

/// The miss path, shared with the seeder: aggregate from the providers and
/// persist title, first rating snapshot and offers in one create.
pub async fn fetch_and_persist(
    store: &Store,
    tmdb: &Arc<dyn TmdbApi>,
    ratings: &Arc<dyn RatingsApi>,
    tmdb_id: i64,
    kind: MediaKind,
) -> Result<StoredTitle> {
    info!("Fetching {} {} from providers", kind, tmdb_id);
    let aggregate = fetch::fetch_aggregate(tmdb, ratings, tmdb_id, kind).await?;
    let record = aggregate.into_record();

    match store.insert_title(&record).await? {
        InsertOutcome::Created(title) => Ok(title),
        InsertOutcome::DuplicateTmdbId => {
            // A concurrent miss resolved first; its row is the one that counts.
            debug!("Concurrent insert won for {} {}, re-reading", kind, tmdb_id);
            store
                .find_title(tmdb_id)
                .await?
                .ok_or_else(|| anyhow!("title {} vanished after duplicate insert", tmdb_id))
        }
    }
}
