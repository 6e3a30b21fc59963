use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::models::{
    AggregatedScores, MediaKind, NewTitle, OfferKind, RatingSnapshot, StoredTitle, StreamingOffer,
};

/// Relational store for titles, rating snapshots and streaming offers.
///
/// Uniqueness of `tmdb_id` is enforced here; callers racing on a first-time
/// insert get [`InsertOutcome::DuplicateTmdbId`] back instead of an error.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

#[derive(Debug)]
pub enum InsertOutcome {
    Created(StoredTitle),
    DuplicateTmdbId,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        // The database file may live in a directory that does not exist yet.
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .context("Failed to create database directory")?;
                    }
                }
            }
        }

        let opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url '{}'", url))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Avoids transient "database is locked" errors under concurrent requests.
            .busy_timeout(Duration::from_secs(5));

        // SQLite permits only limited write concurrency; a single connection
        // keeps writers serialized while the uniqueness constraint still
        // arbitrates between racing cache fills.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .context("Failed to open database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS titles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tmdb_id INTEGER NOT NULL,
                imdb_id TEXT,
                title TEXT NOT NULL,
                title_pt TEXT,
                overview TEXT,
                poster_path TEXT,
                backdrop_path TEXT,
                release_date TEXT,
                media_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_titles_tmdb_id ON titles(tmdb_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ratings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title_id INTEGER NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
                imdb_rating REAL,
                rotten_tomatoes INTEGER,
                metacritic INTEGER,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ratings_title_recorded \
             ON ratings(title_id, recorded_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS streaming_offers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title_id INTEGER NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
                provider TEXT NOT NULL,
                offer_kind TEXT NOT NULL,
                link TEXT,
                available INTEGER NOT NULL DEFAULT 1,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_offers_title ON streaming_offers(title_id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Indexed lookup by TMDB id, with the latest rating snapshot and the
    /// offers currently marked available.
    pub async fn find_title(&self, tmdb_id: i64) -> Result<Option<StoredTitle>> {
        let row = sqlx::query(
            "SELECT id, tmdb_id, imdb_id, title, title_pt, overview, poster_path, \
             backdrop_path, release_date, media_type FROM titles WHERE tmdb_id = ?",
        )
        .bind(tmdb_id)
        .fetch_optional(&self.pool)
        .await
        .context("title lookup failed")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let media_type: String = row.try_get("media_type")?;
        let media_kind = MediaKind::from_str(&media_type)
            .with_context(|| format!("title {} has invalid media_type", id))?;

        let rating = self.latest_rating(id).await?;
        let offers = self.available_offers(id).await?;

        Ok(Some(StoredTitle {
            id,
            tmdb_id: row.try_get("tmdb_id")?,
            imdb_id: row.try_get("imdb_id")?,
            title: row.try_get("title")?,
            title_pt: row.try_get("title_pt")?,
            overview: row.try_get("overview")?,
            poster_path: row.try_get("poster_path")?,
            backdrop_path: row.try_get("backdrop_path")?,
            release_date: row.try_get::<Option<NaiveDate>, _>("release_date")?,
            media_kind,
            rating,
            offers,
        }))
    }

    async fn latest_rating(&self, title_id: i64) -> Result<Option<RatingSnapshot>> {
        let row = sqlx::query(
            "SELECT imdb_rating, rotten_tomatoes, metacritic, recorded_at FROM ratings \
             WHERE title_id = ? ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(RatingSnapshot {
                scores: AggregatedScores {
                    imdb: row.try_get("imdb_rating")?,
                    rotten_tomatoes: row.try_get("rotten_tomatoes")?,
                    metacritic: row.try_get("metacritic")?,
                },
                recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
            }),
            None => None,
        })
    }

    async fn available_offers(&self, title_id: i64) -> Result<Vec<StreamingOffer>> {
        let rows = sqlx::query(
            "SELECT provider, offer_kind, link, recorded_at FROM streaming_offers \
             WHERE title_id = ? AND available = 1 ORDER BY recorded_at DESC, id ASC",
        )
        .bind(title_id)
        .fetch_all(&self.pool)
        .await?;

        let mut offers = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_raw: String = row.try_get("offer_kind")?;
            offers.push(StreamingOffer {
                provider: row.try_get("provider")?,
                kind: OfferKind::from_str(&kind_raw)
                    .with_context(|| format!("title {} has invalid offer kind", title_id))?,
                link: row.try_get("link")?,
                recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
            });
        }
        Ok(offers)
    }

    /// Creates a title with its first rating snapshot and streaming offers in
    /// one transaction. A unique-constraint hit on `tmdb_id` is reported as
    /// [`InsertOutcome::DuplicateTmdbId`] (the transaction rolls back); every
    /// other failure is an error.
    pub async fn insert_title(&self, new: &NewTitle) -> Result<InsertOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        let inserted = sqlx::query(
            "INSERT INTO titles (tmdb_id, imdb_id, title, title_pt, overview, poster_path, \
             backdrop_path, release_date, media_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.tmdb_id)
        .bind(&new.imdb_id)
        .bind(&new.title)
        .bind(&new.title_pt)
        .bind(&new.overview)
        .bind(&new.poster_path)
        .bind(&new.backdrop_path)
        .bind(new.release_date)
        .bind(new.media_kind.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await;

        let title_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(err) if is_unique_violation(&err) => return Ok(InsertOutcome::DuplicateTmdbId),
            Err(err) => return Err(err).context("title insert failed"),
        };

        sqlx::query(
            "INSERT INTO ratings (title_id, imdb_rating, rotten_tomatoes, metacritic, recorded_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title_id)
        .bind(new.scores.imdb)
        .bind(new.scores.rotten_tomatoes)
        .bind(new.scores.metacritic)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("rating snapshot insert failed")?;

        for offer in &new.offers {
            sqlx::query(
                "INSERT INTO streaming_offers (title_id, provider, offer_kind, link, available, \
                 recorded_at) VALUES (?, ?, ?, ?, 1, ?)",
            )
            .bind(title_id)
            .bind(&offer.provider)
            .bind(offer.kind.as_str())
            .bind(&offer.link)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("streaming offer insert failed")?;
        }

        tx.commit().await.context("commit failed")?;

        let stored = self
            .find_title(new.tmdb_id)
            .await?
            .ok_or_else(|| anyhow!("title {} missing right after insert", new.tmdb_id))?;
        Ok(InsertOutcome::Created(stored))
    }

    pub async fn count_titles(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM titles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
