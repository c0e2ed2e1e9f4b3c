//! Single-article scrape orchestration: fetch through the page backend,
//! extract fields, classify failures into the closed [`ScrapeErrorKind`]
//! set the dead-link registry persists.

use chrono::{DateTime, Utc};
use rootsignal_common::source::SourceProfile;
use rootsignal_common::{ScrapeError, ScrapeErrorKind, ScrapedArticle};

use crate::error::ArchiveError;
use crate::extract::extract_article;
use crate::fetch::{FetchContext, PageBackend};

/// Fetch and extract one article page. Never returns `Err` for a page that
/// rendered but didn't look like an article — that case returns an `Err`
/// carrying [`ScrapeErrorKind::Empty`], exactly like every other
/// classified failure, so callers have one error path to the dead-link
/// registry rather than two.
pub async fn scrape_article(
    backend: &PageBackend,
    ctx: &FetchContext,
    url: &str,
    profile: &SourceProfile,
    feed_hint_date: Option<DateTime<Utc>>,
) -> Result<ScrapedArticle, ScrapeError> {
    let page = backend.fetch(ctx, url).await.map_err(|e| ScrapeError {
        kind: classify_fetch_error(&e),
        url: url.to_string(),
    })?;

    if let Some(status) = page.status {
        if status == 404 {
            return Err(ScrapeError {
                kind: ScrapeErrorKind::NotFound,
                url: page.final_url,
            });
        }
        if status >= 500 {
            return Err(ScrapeError {
                kind: ScrapeErrorKind::ServerError,
                url: page.final_url,
            });
        }
    }

    if page.raw_html.to_lowercase().contains("just a moment") {
        return Err(ScrapeError {
            kind: ScrapeErrorKind::AntiBotUnresolved,
            url: page.final_url,
        });
    }

    extract_article(&page.raw_html, &page.final_url, profile, feed_hint_date).ok_or(ScrapeError {
        kind: ScrapeErrorKind::Empty,
        url: page.final_url,
    })
}

fn classify_fetch_error(error: &ArchiveError) -> ScrapeErrorKind {
    let message = error.to_string().to_lowercase();
    if message.contains("404") || message.contains("not found") {
        ScrapeErrorKind::NotFound
    } else if message.contains("timeout") || message.contains("timed out") {
        ScrapeErrorKind::Timeout
    } else if message.contains("cloudflare") || message.contains("just a moment") {
        ScrapeErrorKind::AntiBotUnresolved
    } else if message.contains("500") || message.contains("502") || message.contains("503") {
        ScrapeErrorKind::ServerError
    } else {
        ScrapeErrorKind::Unknown
    }
}
