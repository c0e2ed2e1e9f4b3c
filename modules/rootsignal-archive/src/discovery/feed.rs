//! Feed discoverer (§4.x): HTTP GET + parse an RSS/Atom feed into candidate
//! items. `feed-rs` handles charset detection (including ISO-8859-1 feeds)
//! and both RSS and Atom dialects transparently.

use std::time::Duration;

use anyhow::{Context, Result};
use rootsignal_common::CandidateItem;
use tracing::{info, warn};

static IMG_SRC_RE: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r#"src=['"](https?://[^'"]+)['"]"#).unwrap());

pub struct FeedDiscoverer {
    client: reqwest::Client,
}

impl Default for FeedDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedDiscoverer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build feed HTTP client");
        Self { client }
    }

    /// Fetch and parse a feed, dropping any item whose publication year
    /// falls below `min_year`.
    pub async fn discover(&self, feed_url: &str, min_year: i32) -> Result<Vec<CandidateItem>> {
        let resp = self
            .client
            .get(feed_url)
            .header("User-Agent", "rootsignal-scout/0.1")
            .send()
            .await
            .context("feed fetch failed")?;

        let bytes = resp.bytes().await.context("failed to read feed body")?;
        let feed = feed_rs::parser::parse(&bytes[..]).context("failed to parse feed")?;

        let mut items = Vec::new();
        for entry in feed.entries {
            let Some(url) = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
            else {
                continue;
            };

            let Some(title) = entry.title.map(|t| t.content) else {
                continue;
            };

            let hint_date = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&chrono::Utc));

            if let Some(date) = hint_date {
                if date.format("%Y").to_string().parse::<i32>().unwrap_or(9999) < min_year {
                    continue;
                }
            }

            let hint_image = entry
                .summary
                .as_ref()
                .and_then(|s| IMG_SRC_RE.captures(&s.content))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());

            let mut item = CandidateItem::new(title, url);
            item.hint_date = hint_date;
            item.hint_image = hint_image;
            items.push(item);
        }

        info!(feed_url, items = items.len(), "feed discoverer: parsed");
        Ok(items)
    }

    /// Discover `<link rel="alternate" type="application/{rss,atom}+xml">`
    /// feed URLs declared in a page's `<head>`, for sources without a known
    /// feed URL configured up front.
    pub fn discover_feed_urls(html: &str, base_url: &str) -> Vec<String> {
        let link_re = regex::Regex::new(
            r#"<link[^>]+type\s*=\s*["']application/(rss\+xml|atom\+xml)["'][^>]*>"#,
        )
        .expect("valid regex");
        let href_re = regex::Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("valid regex");

        let Ok(base) = url::Url::parse(base_url) else {
            warn!(base_url, "feed discoverer: invalid base url");
            return Vec::new();
        };

        link_re
            .captures_iter(html)
            .filter_map(|cap| {
                let tag = cap.get(0)?.as_str();
                let href = href_re.captures(tag)?.get(1)?.as_str();
                base.join(href).ok().map(|u| u.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_feed_urls_resolves_relative_href() {
        let html = r#"<link rel="alternate" type="application/rss+xml" href="/feed/rss">"#;
        let urls = FeedDiscoverer::discover_feed_urls(html, "https://news.example.com/section");
        assert_eq!(urls, vec!["https://news.example.com/feed/rss"]);
    }

    #[test]
    fn discover_feed_urls_keeps_absolute_href() {
        let html =
            r#"<link rel="alternate" type="application/atom+xml" href="https://cdn.example.com/atom.xml">"#;
        let urls = FeedDiscoverer::discover_feed_urls(html, "https://news.example.com/");
        assert_eq!(urls, vec!["https://cdn.example.com/atom.xml"]);
    }

    #[test]
    fn discover_feed_urls_ignores_unrelated_links() {
        let html = r#"<link rel="stylesheet" href="/style.css">"#;
        let urls = FeedDiscoverer::discover_feed_urls(html, "https://news.example.com/");
        assert!(urls.is_empty());
    }
}
