//! Calendar-date sweeper (§4.7): walks `start_date` to today one day at a
//! time, loading the dated archive page for each day and extracting links
//! exactly like the listing discoverer. Unlike the nid sweeper, this is a
//! plain candidate producer — there is no canonical-URL problem, since the
//! archive URL itself (not the resulting article URL) is what's templated.
//! Discovery runs to completion across the whole date range before the
//! caller scrapes the accumulated URL set, rather than interleaving.

use std::collections::HashSet;

use chrono::NaiveDate;
use rootsignal_common::source::{DateSweepConfig, SourceProfile};
use rootsignal_common::CandidateItem;
use tracing::{info, warn};

use crate::error::Result;
use crate::fetch::{FetchContext, PageBackend};
use crate::links::{extract_article_links, LinkFilter};

/// Walk `config.start_date` to `today` inclusive, collecting the union of
/// article candidates found on each day's archive page.
pub async fn discover_date_range(
    backend: &PageBackend,
    profile: &SourceProfile,
    config: &DateSweepConfig,
    today: NaiveDate,
) -> Result<Vec<CandidateItem>> {
    let filter = LinkFilter {
        article_url_patterns: &profile.article_url_patterns,
        skip_url_patterns: &profile.skip_url_patterns,
    };
    let fresh_per_page = profile.needs_fresh_context();
    let shared_ctx = if fresh_per_page {
        None
    } else {
        Some(backend.new_context()?)
    };

    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    let mut day = config.start_date;

    while day <= today {
        let date_str = day.format(&config.date_format).to_string();
        let url = config.url_pattern.replace("{date}", &date_str);

        let fresh_ctx;
        let fetch_ctx = match &shared_ctx {
            Some(ctx) => ctx,
            None => {
                fresh_ctx = backend.new_context()?;
                &fresh_ctx
            }
        };

        let page = match backend.fetch(fetch_ctx, &url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url, date = %date_str, error = %e, "date sweep: page fetch failed, skipping day");
                day = day.succ_opt().expect("date overflow");
                continue;
            }
        };

        let found = extract_article_links(&page.raw_html, &page.final_url, &filter);
        let mut new_count = 0;
        for item in found {
            if seen_urls.insert(item.url.clone()) {
                items.push(item);
                new_count += 1;
            }
        }
        info!(date = %date_str, new_count, total = items.len(), "date sweep: day crawled");

        day = day.succ_opt().expect("date overflow");
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootsignal_common::source::SourcesDocument;

    fn profile_with_date_sweep() -> SourceProfile {
        let yaml = r#"
test-source:
  name: "Test Source"
  url: "https://news.example.com"
  date_sweep:
    url_pattern: "https://news.example.com/archive/{date}"
    date_format: "%Y-%m-%d"
    start_date: "2026-01-01"
"#;
        let doc = SourcesDocument::parse(yaml).unwrap();
        doc.get("test-source").unwrap().clone()
    }

    #[test]
    fn date_format_substitution() {
        let profile = profile_with_date_sweep();
        let config = profile.date_sweep.unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        let date_str = day.format(&config.date_format).to_string();
        let url = config.url_pattern.replace("{date}", &date_str);
        assert_eq!(url, "https://news.example.com/archive/2026-01-03");
    }
}
