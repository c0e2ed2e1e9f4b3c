//! Paginated-archive discoverer (§4.x): walks each configured section's
//! `archive_pattern` page by page until it's exhausted or stops yielding
//! anything new.

use std::collections::HashSet;

use rootsignal_common::source::SourceProfile;
use rootsignal_common::CandidateItem;
use tracing::{info, warn};

use crate::error::Result;
use crate::fetch::{FetchContext, PageBackend};
use crate::links::{extract_article_links, LinkFilter};

/// A section stops early once this many consecutive pages contribute zero
/// *new* links (as opposed to zero links at all, which stops immediately).
const MAX_CONSECUTIVE_EMPTY_PAGES: u32 = 3;

/// Crawl every section's paginated archive up to `max_pages_override` pages
/// (or the section's own `max_pages`, whichever is smaller). Sources that
/// enforce per-session anti-bot challenges (`needs_fresh_context`) get a
/// fresh browsing context per page; others share one context across the
/// whole crawl.
pub async fn crawl_archive_pages(
    backend: &PageBackend,
    profile: &SourceProfile,
    max_pages_override: u32,
) -> Result<Vec<CandidateItem>> {
    let filter = LinkFilter {
        article_url_patterns: &profile.article_url_patterns,
        skip_url_patterns: &profile.skip_url_patterns,
    };
    let fresh_per_page = profile.needs_fresh_context();

    let mut all_items = Vec::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let shared_ctx = if fresh_per_page {
        None
    } else {
        Some(backend.new_context()?)
    };

    for (section, config) in &profile.sections {
        let Some(pattern) = &config.archive_pattern else {
            continue;
        };
        let max_pages = max_pages_override.min(config.max_pages);
        let mut consecutive_empty = 0u32;

        for i in 0..max_pages {
            let page_val = config.page_start + i * config.page_step;
            let url = pattern.replace("{page}", &page_val.to_string());

            let fetch_result = match &shared_ctx {
                Some(ctx) => backend.fetch(ctx, &url).await,
                None => {
                    let ctx = backend.new_context()?;
                    backend.fetch(&ctx, &url).await
                }
            };

            let page = match fetch_result {
                Ok(page) => page,
                Err(e) => {
                    warn!(section, page = i + 1, error = %e, "archive discoverer: page fetch failed");
                    continue;
                }
            };

            let links = extract_article_links(&page.raw_html, &page.final_url, &filter);
            if links.is_empty() {
                info!(section, page = i + 1, "archive discoverer: no links, stopping section");
                break;
            }

            let mut new_count = 0;
            for item in links {
                if seen_urls.insert(item.url.clone()) {
                    all_items.push(item);
                    new_count += 1;
                }
            }

            info!(section, page = i + 1, new_count, total = all_items.len(), "archive discoverer: page crawled");

            if new_count == 0 {
                consecutive_empty += 1;
                if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_PAGES {
                    info!(section, "archive discoverer: {MAX_CONSECUTIVE_EMPTY_PAGES} consecutive empty pages, stopping section");
                    break;
                }
            } else {
                consecutive_empty = 0;
            }
        }
    }

    Ok(all_items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_pattern_substitution() {
        let pattern = "https://news.example.com/archive?page={page}";
        assert_eq!(
            pattern.replace("{page}", &3.to_string()),
            "https://news.example.com/archive?page=3"
        );
    }
}
