//! Listing-page discoverer (§4.x): one navigation per configured section
//! homepage, filtered through the shared article-link extraction rules.

use rootsignal_common::source::SourceProfile;
use rootsignal_common::CandidateItem;
use tracing::info;

use crate::error::Result;
use crate::fetch::{FetchContext, PageBackend};
use crate::links::{extract_article_links, LinkFilter};

/// Crawl every configured section's `listing_url` once each, returning the
/// union of discovered candidates. Within-page dedup is handled by
/// [`extract_article_links`]; across-section dedup is the caller's job
/// (the same article can legitimately be linked from two sections).
pub async fn discover_listings(
    backend: &PageBackend,
    ctx: &FetchContext,
    profile: &SourceProfile,
) -> Result<Vec<CandidateItem>> {
    let filter = LinkFilter {
        article_url_patterns: &profile.article_url_patterns,
        skip_url_patterns: &profile.skip_url_patterns,
    };

    let mut items = Vec::new();
    for (section, config) in &profile.sections {
        let page = backend.fetch(ctx, &config.listing_url).await?;
        let found = extract_article_links(&page.raw_html, &page.final_url, &filter);
        info!(section, count = found.len(), "listing discoverer: section crawled");
        items.extend(found);
    }
    Ok(items)
}
