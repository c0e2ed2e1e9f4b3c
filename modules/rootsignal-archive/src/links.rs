//! Link extraction for the listing-page and archive-page discoverers.
//!
//! `extract_all_links`/`extract_links_by_pattern` are generic href
//! extraction helpers. `extract_article_links` layers the discoverer's
//! actual filtering rules on top: same-origin only, a minimum path-segment
//! count (bypassed when an explicit article URL pattern matches), and
//! rejection of category/tag/author/media/feed paths.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use rootsignal_common::CandidateItem;
use scraper::{Html, Selector};

/// Matches `href` attributes — the only semantic "link" in HTML.
/// Covers `<a href>`, `<link href>`, `<area href>`.
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

/// Resolve a raw href against a base URL, returning an absolute URL with fragment stripped.
fn resolve_href(raw: &str, base: Option<&url::Url>) -> Option<String> {
    let mut parsed = if raw.starts_with("http://") || raw.starts_with("https://") {
        url::Url::parse(raw).ok()?
    } else {
        base?.join(raw).ok()?
    };
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Extract all links from raw HTML.
/// Only extracts URLs from `href` attributes (`<a>`, `<link>`, `<area>`),
/// ignoring URLs in `src`, `xmlns`, data attributes, JS, CSS, and plain text.
/// Resolves relative hrefs against `base_url`. Deduplicates.
pub fn extract_all_links(html: &str, base_url: &str) -> Vec<String> {
    let base = url::Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in HREF_RE.captures_iter(html) {
        let raw = &cap[1];
        if let Some(resolved) = resolve_href(raw, base.as_ref()) {
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }

    links
}

/// Extract links from raw HTML that match a given URL pattern.
/// Only extracts from `href` attributes; deduplicates.
pub fn extract_links_by_pattern(html: &str, base_url: &str, pattern: &str) -> Vec<String> {
    extract_all_links(html, base_url)
        .into_iter()
        .filter(|url| pattern.is_empty() || url.contains(pattern))
        .collect()
}

/// Default path segments rejected regardless of per-source configuration —
/// navigation chrome, not article content.
static DEFAULT_SKIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(category|tag|page|author|wp-content|feed|login)/").expect("valid regex")
});

static MEDIA_EXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|svg|webp|pdf)$").expect("valid regex")
});

static GENERIC_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(more|comments?|\(\d+\)|read more)").expect("valid regex")
});

fn matches_any(patterns: &[String], haystack: &str) -> bool {
    patterns.iter().any(|p| {
        Regex::new(p)
            .map(|re| re.is_match(haystack))
            .unwrap_or(false)
    })
}

/// Filtering knobs for `extract_article_links`, taken directly from a
/// source's YAML profile (§6).
pub struct LinkFilter<'a> {
    pub article_url_patterns: &'a [String],
    pub skip_url_patterns: &'a [String],
}

/// Extract `(title, url)` candidates from a listing/archive page, applying
/// the discoverer's filtering rules: same-origin, skip-pattern and
/// media-extension rejection, generic-anchor-text rejection, and either an
/// `article_url_patterns` match or a minimum 3-path-segment requirement.
pub fn extract_article_links(html: &str, base_url: &str, filter: &LinkFilter<'_>) -> Vec<CandidateItem> {
    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").expect("valid selector");

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for el in document.select(&anchor_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_href(href, Some(&base)) else {
            continue;
        };
        // Query string intentionally kept (e.g. `?nid=123` article URLs);
        // only the fragment was stripped above.
        let text: String = el.text().collect::<String>().trim().to_string();

        if text.chars().count() < 10 || text.chars().count() > 300 {
            continue;
        }
        if GENERIC_TEXT_RE.is_match(&text) {
            continue;
        }

        let Ok(parsed) = url::Url::parse(&resolved) else {
            continue;
        };
        if parsed.host_str() != base.host_str() {
            continue;
        }
        if MEDIA_EXT_RE.is_match(resolved.as_str()) {
            continue;
        }
        if DEFAULT_SKIP_RE.is_match(resolved.as_str()) || matches_any(filter.skip_url_patterns, &resolved) {
            continue;
        }

        let full_path = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        };
        let matched_pattern = !filter.article_url_patterns.is_empty()
            && matches_any(filter.article_url_patterns, &full_path);
        if !filter.article_url_patterns.is_empty() && !matched_pattern {
            continue;
        }
        if !matched_pattern {
            let segments = parsed
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).count())
                .unwrap_or(0);
            if segments < 3 {
                continue;
            }
        }

        if !seen.insert(resolved.clone()) {
            continue;
        }
        items.push(CandidateItem::new(text, resolved));
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- href extraction ---

    #[test]
    fn href_links_are_extracted() {
        let html = r#"<a href="https://news.example.com/sports">IG</a>"#;
        let links = extract_all_links(html, "https://example.com");
        assert_eq!(links, vec!["https://news.example.com/sports"]);
    }

    #[test]
    fn extracts_multiple_hrefs() {
        let html = r#"
            <a href="https://a.com">A</a>
            <a href="https://b.com">B</a>
        "#;
        let links = extract_all_links(html, "https://example.com");
        assert!(links.contains(&"https://a.com/".to_string()));
        assert!(links.contains(&"https://b.com/".to_string()));
    }

    #[test]
    fn single_quoted_href() {
        let html = "<a href='https://example.com/page'>link</a>";
        let links = extract_all_links(html, "https://base.com");
        assert!(links.contains(&"https://example.com/page".to_string()));
    }

    // --- Non-href URLs are ignored ---

    #[test]
    fn namespace_uris_are_not_extracted() {
        let html = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>
            <div about="http://purl.org/dc/terms/">RDF</div>"#;
        let links = extract_all_links(html, "https://example.com");
        assert!(links.is_empty(), "namespace/RDF URIs should not be extracted");
    }

    #[test]
    fn image_src_is_not_extracted() {
        let html = r#"<img src="https://cdn.example.com/thumb.jpg">"#;
        let links = extract_all_links(html, "https://example.com");
        assert!(links.is_empty(), "img src should not be extracted");
    }

    #[test]
    fn script_urls_are_not_extracted() {
        let html = r#"<script src="https://cdn.example.com/app.js"></script>
            <script>var u = "https://api.example.com/v1";</script>"#;
        let links = extract_all_links(html, "https://example.com");
        assert!(links.is_empty(), "script src and inline JS URLs should not be extracted");
    }

    #[test]
    fn plain_text_urls_are_not_extracted() {
        let html = "Visit us at https://example.com/about for more info";
        let links = extract_all_links(html, "https://base.com");
        assert!(links.is_empty(), "plain text URLs should not be extracted");
    }

    #[test]
    fn data_attribute_urls_are_not_extracted() {
        let html = r#"<div data-url="https://cdn.example.com/img.png">content</div>"#;
        let links = extract_all_links(html, "https://base.com");
        assert!(links.is_empty(), "data attribute URLs should not be extracted");
    }

    // --- Relative URL resolution ---

    #[test]
    fn relative_hrefs_still_resolve() {
        let html = r#"<a href="/about">About</a>"#;
        let links = extract_all_links(html, "https://example.com");
        assert!(links.contains(&"https://example.com/about".to_string()));
    }

    #[test]
    fn resolves_relative_path() {
        let html = r#"<a href="news/today">News</a>"#;
        let links = extract_all_links(html, "https://example.com/archive/");
        assert!(links.contains(&"https://example.com/archive/news/today".to_string()));
    }

    // --- Deduplication ---

    #[test]
    fn deduplication_still_works() {
        let html = r#"
            <a href="https://example.com/page">link1</a>
            <a href="https://example.com/page">link2</a>
        "#;
        let links = extract_all_links(html, "https://base.com");
        let count = links.iter().filter(|u| *u == "https://example.com/page").count();
        assert_eq!(count, 1, "Same URL should appear exactly once");
    }

    // --- Fragment stripping ---

    #[test]
    fn fragment_is_stripped_from_absolute_href() {
        let html = r#"<a href="https://example.com/page#section">link</a>"#;
        let links = extract_all_links(html, "https://base.com");
        assert_eq!(links, vec!["https://example.com/page"]);
    }

    #[test]
    fn fragment_is_stripped_from_relative_href() {
        let html = r#"<a href="/page#breadcrumb">link</a>"#;
        let links = extract_all_links(html, "https://example.com");
        assert_eq!(links, vec!["https://example.com/page"]);
    }

    #[test]
    fn same_page_with_different_fragments_deduplicates() {
        let html = r#"
            <a href="/page#breadcrumb">one</a>
            <a href="/page#primaryimage">two</a>
            <a href="/page#footer">three</a>
        "#;
        let links = extract_all_links(html, "https://example.com");
        assert_eq!(links, vec!["https://example.com/page"]);
    }

    #[test]
    fn bare_fragment_resolves_to_base_url() {
        let html = r##"<a href="#top">back to top</a>"##;
        let links = extract_all_links(html, "https://example.com/page");
        assert_eq!(links, vec!["https://example.com/page"]);
    }

    // --- Empty / malformed ---

    #[test]
    fn empty_html_returns_empty() {
        let links = extract_all_links("", "https://example.com");
        assert!(links.is_empty());
    }

    #[test]
    fn no_links_returns_empty() {
        let html = "<p>Just some text with no links</p>";
        let links = extract_all_links(html, "https://example.com");
        assert!(links.is_empty());
    }

    #[test]
    fn empty_href_skipped() {
        let html = r#"<a href="">empty</a>"#;
        let links = extract_all_links(html, "https://example.com");
        // Empty href resolves to base URL
        assert!(links.len() <= 1);
    }

    #[test]
    fn malformed_base_url_does_not_crash() {
        let html = r#"<a href="/about">link</a>"#;
        let links = extract_all_links(html, "not a url");
        // Should not panic; relative hrefs just get skipped
        assert!(links.is_empty() || !links.is_empty());
    }

    // --- Mixed content (realistic listing page) ---

    #[test]
    fn realistic_listing_page_links() {
        let html = r#"
            <a href="https://news.example.com/news/123/city-council-votes">City council votes on new budget plan</a>
            <a href="https://news.example.com/category/politics/">Politics</a>
            <a href="https://news.example.com/news.php?nid=456">Second story with a long enough title</a>
            <a href="/terms">Terms</a>
        "#;
        let links = extract_all_links(html, "https://news.example.com");
        assert!(links.contains(&"https://news.example.com/news/123/city-council-votes".to_string()));
        assert!(links.contains(&"https://news.example.com/category/politics/".to_string()));
        assert!(links.contains(&"https://news.example.com/news.php?nid=456".to_string()));
        assert!(links.contains(&"https://news.example.com/terms".to_string()));
        assert_eq!(links.len(), 4);
    }

    // --- extract_links_by_pattern ---

    #[test]
    fn pattern_filter_news_path() {
        let html = r#"
            <a href="https://news.example.com/news/1">News 1</a>
            <a href="https://news.example.com/sports/1">Sports 1</a>
            <a href="https://news.example.com/news/2">News 2</a>
        "#;
        let links = extract_links_by_pattern(html, "https://base.com", "/news/");
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|u| u.contains("/news/")));
    }

    #[test]
    fn pattern_empty_returns_all() {
        let html = r#"<a href="https://a.com">A</a><a href="https://b.com">B</a>"#;
        let links = extract_links_by_pattern(html, "https://base.com", "");
        assert_eq!(links.len(), 2);
    }

    // --- extract_article_links ---

    fn no_filter() -> LinkFilter<'static> {
        LinkFilter {
            article_url_patterns: &[],
            skip_url_patterns: &[],
        }
    }

    #[test]
    fn article_links_require_three_path_segments_by_default() {
        let html = r#"
            <a href="https://news.example.com/2026/02/04/city-council-votes-on-budget">City council votes on the new budget plan</a>
            <a href="https://news.example.com/about">About the newsroom team</a>
        "#;
        let items = extract_article_links(html, "https://news.example.com", &no_filter());
        assert_eq!(items.len(), 1);
        assert!(items[0].url.contains("city-council-votes"));
    }

    #[test]
    fn article_url_pattern_bypasses_segment_count() {
        let filter = LinkFilter {
            article_url_patterns: &[r"/news\.php\?nid=\d+".to_string()],
            skip_url_patterns: &[],
        };
        let html = r#"<a href="https://news.example.com/news.php?nid=456">Second story with a long enough title</a>"#;
        let items = extract_article_links(html, "https://news.example.com", &filter);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn category_and_tag_paths_are_rejected() {
        let html = r#"
            <a href="https://news.example.com/category/politics/a-long-enough-title-here">Politics section landing page</a>
            <a href="https://news.example.com/tag/elections/another-long-title-here">Elections tag landing page</a>
        "#;
        let items = extract_article_links(html, "https://news.example.com", &no_filter());
        assert!(items.is_empty());
    }

    #[test]
    fn cross_origin_links_are_rejected() {
        let html = r#"<a href="https://other.example.com/2026/02/04/some-article-title">Some article title that is long enough</a>"#;
        let items = extract_article_links(html, "https://news.example.com", &no_filter());
        assert!(items.is_empty());
    }

    #[test]
    fn short_and_long_anchor_text_is_rejected() {
        let html = r#"
            <a href="https://news.example.com/2026/02/04/short">Short</a>
            <a href="https://news.example.com/2026/02/05/read-more">read more</a>
        "#;
        let items = extract_article_links(html, "https://news.example.com", &no_filter());
        assert!(items.is_empty());
    }

    #[test]
    fn media_extensions_are_rejected() {
        let html = r#"<a href="https://news.example.com/2026/02/04/photo.jpg">A photo caption long enough to pass</a>"#;
        let items = extract_article_links(html, "https://news.example.com", &no_filter());
        assert!(items.is_empty());
    }

    #[test]
    fn skip_url_patterns_from_profile_are_honored() {
        let filter = LinkFilter {
            article_url_patterns: &[],
            skip_url_patterns: &[r"/sponsored/".to_string()],
        };
        let html = r#"<a href="https://news.example.com/sponsored/2026/02/04/ad-title-here">A sponsored content title goes here</a>"#;
        let items = extract_article_links(html, "https://news.example.com", &filter);
        assert!(items.is_empty());
    }

    #[test]
    fn within_page_dedup() {
        let html = r#"
            <a href="https://news.example.com/2026/02/04/one-title-here#comments">One title here for dedup</a>
            <a href="https://news.example.com/2026/02/04/one-title-here">One title here for dedup</a>
        "#;
        let items = extract_article_links(html, "https://news.example.com", &no_filter());
        assert_eq!(items.len(), 1);
    }
}
