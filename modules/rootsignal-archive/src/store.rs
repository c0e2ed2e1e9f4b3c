//! Persistence adapter (§4.10): idempotent article inserts, dead-link
//! registry, and active-source lookup, backed by a bounded Postgres pool.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rootsignal_common::{ArticleRecord, DeadLinkRecord, ScrapedArticle, Source};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ArchiveError, Result};

/// Thin wrapper over a bounded `sqlx` Postgres pool (min 2, max 10
/// connections per §4.10) exposing exactly the queries the discoverers,
/// scraper, and scheduler need.
#[derive(Clone)]
pub struct ArchiveStore {
    pool: PgPool,
}

impl ArchiveStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(2)
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations. Safe to call on every process start.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ArchiveError::MigrationFailed(e.to_string()))
    }

    pub async fn get_active_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, Source>(
            "SELECT id, slug, name, url, rss_url, language, is_active \
             FROM sources WHERE is_active = true ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_source_by_slug(&self, slug: &str) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, Source>(
            "SELECT id, slug, name, url, rss_url, language, is_active \
             FROM sources WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Which of `urls` already exist for this source.
    pub async fn existing_urls(&self, source_id: Uuid, urls: &[String]) -> Result<HashSet<String>> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT url FROM articles WHERE source_id = $1 AND url = ANY($2::text[])",
        )
        .bind(source_id)
        .bind(urls)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    /// All article URLs ever stored for a source. Used by the nid and date
    /// sweepers, which pre-dedup a much larger candidate set than a single
    /// feed/listing page.
    pub async fn all_source_urls(&self, source_id: Uuid) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT url FROM articles WHERE source_id = $1")
                .bind(source_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    /// Normalized titles inserted for this source within the last `days`
    /// days, for the in-run dedup pre-filter.
    pub async fn recent_titles(&self, source_id: Uuid, days: i64) -> Result<HashSet<String>> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT title FROM articles WHERE source_id = $1 AND created_at >= $2",
        )
        .bind(source_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(t,)| rootsignal_common::text::normalize_title(&t))
            .collect())
    }

    /// Insert a scraped article. Returns `None` if the URL was already
    /// present (the `url` UNIQUE constraint is the actual safety net —
    /// `ON CONFLICT DO NOTHING` makes this idempotent under races).
    pub async fn insert_article(
        &self,
        source_id: Uuid,
        url: &str,
        article: &ScrapedArticle,
    ) -> Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO articles ( \
                source_id, url, title, content, excerpt, image_url, author, \
                published_at, language \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (url) DO NOTHING \
             RETURNING id",
        )
        .bind(source_id)
        .bind(url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.excerpt)
        .bind(&article.image_url)
        .bind(&article.author)
        .bind(article.published_at)
        .bind(&article.language)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Insert a new dead-link row, or increment `retry_count` on a repeat
    /// failure of a URL already recorded.
    pub async fn record_dead_link(&self, source_id: Uuid, url: &str, error_type: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO dead_links (source_id, url, error_type) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (url) DO UPDATE SET \
                error_type = EXCLUDED.error_type, \
                last_checked_at = NOW(), \
                retry_count = dead_links.retry_count + 1",
        )
        .bind(source_id)
        .bind(url)
        .bind(error_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a dead-link row after a successful retry.
    pub async fn remove_dead_link(&self, url: &str) -> Result<()> {
        sqlx::query("DELETE FROM dead_links WHERE url = $1")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fetch the dead-link rows for `urls`, for pre-filtering a discovered
    /// candidate set by the pure [`rootsignal_common::dead_link::is_suppressed`]
    /// decision.
    pub async fn suppressed_subset(
        &self,
        source_id: Uuid,
        urls: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, DeadLinkRecord>(
            "SELECT id, source_id, url, error_type, first_failed_at, last_checked_at, retry_count \
             FROM dead_links WHERE source_id = $1 AND url = ANY($2::text[])",
        )
        .bind(source_id)
        .bind(urls)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter(|r| rootsignal_common::dead_link::is_suppressed(r, now))
            .map(|r| r.url)
            .collect())
    }

    /// Every currently-suppressed URL for a source. Used by the nid and
    /// date sweepers, which need the full set up front rather than
    /// checking it URL-by-URL.
    pub async fn all_suppressed(&self, source_id: Uuid, now: DateTime<Utc>) -> Result<HashSet<String>> {
        let rows = sqlx::query_as::<_, DeadLinkRecord>(
            "SELECT id, source_id, url, error_type, first_failed_at, last_checked_at, retry_count \
             FROM dead_links WHERE source_id = $1",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter(|r| rootsignal_common::dead_link::is_suppressed(r, now))
            .map(|r| r.url)
            .collect())
    }

    /// Per-source article counts and latest publish date, for the
    /// operator's status view.
    pub async fn article_stats(&self) -> Result<Vec<ArticleStat>> {
        let rows = sqlx::query_as::<_, ArticleStat>(
            "SELECT s.name, s.slug, s.language, COUNT(a.id) as count, \
                    MAX(a.published_at) as latest_article \
             FROM sources s \
             LEFT JOIN articles a ON a.source_id = s.id \
             GROUP BY s.id, s.name, s.slug, s.language \
             ORDER BY s.name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[cfg(any(test, debug_assertions))]
    pub async fn fetch_article(&self, url: &str) -> Result<Option<ArticleRecord>> {
        let row = sqlx::query_as::<_, ArticleRecord>(
            "SELECT id, source_id, url, title, content, excerpt, image_url, author, \
                    published_at, scraped_at, language, created_at, updated_at \
             FROM articles WHERE url = $1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleStat {
    pub name: String,
    pub slug: String,
    pub language: String,
    pub count: i64,
    pub latest_article: Option<DateTime<Utc>>,
}
