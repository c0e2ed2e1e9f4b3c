use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured news source. Loaded once at startup from the `sources` table
/// (identity fields) joined with its YAML extraction profile; immutable for
/// the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub url: String,
    pub rss_url: Option<String>,
    pub language: String,
    pub is_active: bool,
}

/// A `(title, url, hint_date?)` tuple produced by a discoverer before dedup
/// and scraping. Discarded once rejected by the dedup filter or consumed by
/// the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    pub url: String,
    pub hint_date: Option<DateTime<Utc>>,
    pub hint_image: Option<String>,
}

impl CandidateItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            hint_date: None,
            hint_image: None,
        }
    }
}

/// The result of a successful scrape, built inside a worker and handed to
/// the persistence adapter.
#[derive(Debug, Clone)]
pub struct ScrapedArticle {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    /// The URL observed after any redirects during navigation. Used as the
    /// storage and dedup key for sequential-ID sweeps.
    pub final_url: String,
    pub language: String,
}

/// A classified scrape failure. The dead-link registry's `error_type` column
/// uses exactly these variants (closed set at the process boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeErrorKind {
    NotFound,
    Timeout,
    ServerError,
    AntiBotUnresolved,
    Empty,
    Unknown,
}

impl ScrapeErrorKind {
    /// The `dead_links.error_type` string for this kind.
    pub fn as_db_str(self) -> &'static str {
        match self {
            ScrapeErrorKind::NotFound => "404",
            ScrapeErrorKind::Timeout => "timeout",
            ScrapeErrorKind::ServerError => "500",
            ScrapeErrorKind::AntiBotUnresolved => "cloudflare",
            ScrapeErrorKind::Empty => "empty",
            ScrapeErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ScrapeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// A classified scrape failure, emitted by the scraper and consumed by the
/// dead-link registry.
#[derive(Debug, Clone)]
pub struct ScrapeError {
    pub kind: ScrapeErrorKind,
    pub url: String,
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} scraping {}", self.kind, self.url)
    }
}

impl std::error::Error for ScrapeError {}

/// A persisted article record (the `articles` table).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted dead-link record (the `dead_links` table). `url` is unique;
/// `retry_count` drives the suppression policy in §4.2 of the design.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeadLinkRecord {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub error_type: String,
    pub first_failed_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub retry_count: i32,
}

/// Backoff schedule (days) indexed by `retry_count`. `retry_count >= 3` is
/// permanently suppressed (see [`crate::dead_link::is_suppressed`]).
pub const DEAD_LINK_BACKOFF_DAYS: [i64; 3] = [7, 14, 30];
pub const DEAD_LINK_PERMANENT_THRESHOLD: i32 = 3;

/// Per-run, per-source and aggregate counters. Not persisted as a table;
/// logged at `info` level at the end of a run and returned to the operator
/// binary for programmatic use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub inserted: u64,
    pub skipped_no_date: u64,
    pub skipped_duplicate: u64,
    pub scrape_errors_by_kind: std::collections::BTreeMap<String, u64>,
}

impl RunSummary {
    pub fn record_error(&mut self, kind: ScrapeErrorKind) {
        *self
            .scrape_errors_by_kind
            .entry(kind.as_db_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &RunSummary) {
        self.inserted += other.inserted;
        self.skipped_no_date += other.skipped_no_date;
        self.skipped_duplicate += other.skipped_duplicate;
        for (k, v) in &other.scrape_errors_by_kind {
            *self.scrape_errors_by_kind.entry(k.clone()).or_insert(0) += v;
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted={} skipped_no_date={} skipped_duplicate={} errors={:?}",
            self.inserted, self.skipped_no_date, self.skipped_duplicate, self.scrape_errors_by_kind
        )
    }
}

/// A page fetched through the browser pool adapter, before extraction.
/// Both backends (local Chromium, remote Browserless) produce this same
/// shape so the scraper and discoverers don't need to know which is active.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub raw_html: String,
    pub status: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_summary_merge_sums_counters() {
        let mut a = RunSummary {
            inserted: 3,
            skipped_no_date: 1,
            skipped_duplicate: 0,
            scrape_errors_by_kind: Default::default(),
        };
        a.record_error(ScrapeErrorKind::Timeout);
        let mut b = RunSummary::default();
        b.inserted = 2;
        b.record_error(ScrapeErrorKind::Timeout);
        b.record_error(ScrapeErrorKind::NotFound);

        a.merge(&b);
        assert_eq!(a.inserted, 5);
        assert_eq!(a.skipped_no_date, 1);
        assert_eq!(a.scrape_errors_by_kind["timeout"], 2);
        assert_eq!(a.scrape_errors_by_kind["404"], 1);
    }

    #[test]
    fn scrape_error_kind_db_strings_match_closed_set() {
        assert_eq!(ScrapeErrorKind::NotFound.as_db_str(), "404");
        assert_eq!(ScrapeErrorKind::Timeout.as_db_str(), "timeout");
        assert_eq!(ScrapeErrorKind::ServerError.as_db_str(), "500");
        assert_eq!(ScrapeErrorKind::AntiBotUnresolved.as_db_str(), "cloudflare");
        assert_eq!(ScrapeErrorKind::Empty.as_db_str(), "empty");
        assert_eq!(ScrapeErrorKind::Unknown.as_db_str(), "unknown");
    }
}
