//! Selector-driven article field extraction (§4.7): given a fetched page's
//! raw HTML, pulls title/author/date/content/image through a per-source CSS
//! selector cascade, strips bylines and datelines from the body, and runs
//! the five-level date waterfall.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rootsignal_common::{source::SourceProfile, text, ScrapedArticle};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Meta tags carrying the author, checked in order ahead of any selector.
const AUTHOR_META_TAGS: &[&str] = &["author", "article:author"];

/// Elements whose text never belongs in extracted content: chrome, ads, and
/// this site family's own "AI quick-read" summary widgets.
const CONTENT_BLOCKLIST: &str = "script, style, noscript, iframe, nav, header, footer, aside, \
    .navbar, .navigation, .menu, .google-auto-placed, .adsbygoogle, \
    [id*=\"google_ads\"], [class*=\"social\"], .share-buttons, .comments-section, \
    #aiSummaryBox, .ai-quickread-box, .ai-quickread, .ai-qr-title, .ai-qr-subtitle, \
    .ai-quickread-badge, .ai-quickread-hide, .ai-quickread-loading, .fotorama, \
    figure figcaption";

/// Same idea but lighter — used only for the body-text snippet the date
/// waterfall's fourth tier reads from, which doesn't need the ad/social
/// blocklist, just script/style noise out of the way.
const BODY_TEXT_BLOCKLIST: &str =
    "script, style, noscript, nav, header, footer, aside, .google-auto-placed, .adsbygoogle";

/// Selectors tried, in order, for the narrower "article area" used as the
/// body-text source for date-waterfall fallback, ahead of falling back to
/// the whole document body.
const ARTICLE_AREA_SELECTORS: &[&str] = &[".news_body_areas", ".news-content", "article", "main"];

/// Minimum cleaned content length (characters) below which a page is
/// considered not to be an article render (§4.7 edge case: JS-only pages,
/// paywalls, listing pages linked in error).
const MIN_CONTENT_LEN: usize = 100;

/// Content below which a selector match is rejected before falling back to
/// the next selector, or to the whole document body.
const MIN_SELECTOR_CONTENT_LEN: usize = 200;

const EXCERPT_MAX_LEN: usize = 300;

static BYLINE_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"(?m)^By\s+([A-Za-z][A-Za-z. ]+?)(?:\s*\n|(?=\s+Colombo|\s+[A-Z]{2,}))")
        .unwrap()
});
static DATELINE_COLOMBO_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^Colombo,?\s+.{0,60}?\((?:Daily\s?Mirror|DailyMirror|Mirror\s+Sports)\)\s*-?\s*",
    )
    .unwrap()
});
static DATELINE_SHORT_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s*\d{1,2}(?:st|nd|rd|th)?(?:\s*\((?:Daily\s?Mirror|DailyMirror|Mirror\s+Sports)\))?\s*-\s*",
    )
    .unwrap()
});
static DATELINE_NEWS1ST_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"(?i)^COLOMBO\s*\(News\s?1st\)\s*[;:\x{2013}-]\s*").unwrap()
});
static AUTHOR_BY_PREFIX_RE: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"(?i)^by\s+").unwrap());
static AUTHOR_TRAILING_DATE_RE: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"\s*\d{1,2}[-/]\d{1,2}[-/]\d{4}.*$").unwrap());
static EXCERPT_SKIP_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^(By\s+[A-Z]|Photo\s*:|Pic\s*:|Image\s*:|Courtesy\s*:|Colombo,?\s|COLOMBO\s*\(\
         |(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s*\d)",
    )
    .unwrap()
});
static INLINE_AUTHOR_PARA_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"^By\s+([A-Z][A-Za-z. ]+?)(?:\s*$|\s+(?:Colombo|[A-Z]{2,}))").unwrap()
});

/// Extract a [`ScrapedArticle`] from a fetched page's raw HTML, or `None`
/// if the rendered content was too short to be a real article (§4.7).
pub fn extract_article(
    html: &str,
    final_url: &str,
    profile: &SourceProfile,
    feed_hint_date: Option<DateTime<Utc>>,
) -> Option<ScrapedArticle> {
    let document = Html::parse_document(html);
    let metas = collect_meta_tags(&document);

    let title = try_selectors(&document, &profile.selectors.title)
        .or_else(|| metas.get("og:title").cloned())
        .unwrap_or_default();

    let mut author = AUTHOR_META_TAGS
        .iter()
        .find_map(|key| metas.get(*key).cloned())
        .or_else(|| try_selectors(&document, &profile.selectors.author))
        .or_else(|| inline_author_fallback(&document));

    let date_str = profile
        .date_meta_tags
        .iter()
        .find_map(|key| metas.get(key).cloned())
        .or_else(|| try_selectors_attr(&document, &profile.selectors.date, "datetime"))
        .or_else(|| try_selectors(&document, &profile.selectors.date))
        .or_else(|| published_link_fallback(&document));

    let blocklist = Selector::parse(CONTENT_BLOCKLIST).expect("valid content blocklist selector");
    let content = profile
        .selectors
        .content
        .iter()
        .find_map(|css| {
            let selector = Selector::parse(css).ok()?;
            let el = document.select(&selector).next()?;
            let cleaned = clean_text(el, &blocklist);
            (cleaned.chars().count() > MIN_SELECTOR_CONTENT_LEN).then_some(cleaned)
        })
        .or_else(|| {
            let body_selector = Selector::parse("body").ok()?;
            document
                .select(&body_selector)
                .next()
                .map(|el| clean_text(el, &blocklist))
        })
        .unwrap_or_default();

    if content.chars().count() < MIN_CONTENT_LEN {
        return None;
    }

    let image_url = metas
        .get("og:image")
        .cloned()
        .or_else(|| try_selectors_attr(&document, &profile.selectors.image, "src"))
        .or_else(|| {
            let selector = Selector::parse("article img").ok()?;
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("src"))
                .map(str::to_string)
        });

    let body_text = article_area_text(&document);
    let published_at = rootsignal_common::date::extract_date_waterfall(
        date_str.as_deref(),
        date_str.as_deref(),
        final_url,
        &body_text,
        feed_hint_date.map(|d| d.to_rfc2822()).as_deref(),
    );

    let mut content = text::normalize_text(&content);
    let title = text::normalize_text(&title);
    let mut author = author.map(|a| text::normalize_text(&a));

    if let Some(a) = &author {
        let stripped = AUTHOR_BY_PREFIX_RE.replace(a, "");
        let stripped = AUTHOR_TRAILING_DATE_RE.replace(&stripped, "");
        let stripped = stripped.trim().to_string();
        author = (!stripped.is_empty()).then_some(stripped);
    }

    if let Some(m) = BYLINE_RE.find(&content) {
        if author.is_none() {
            if let Some(caps) = BYLINE_RE.captures(&content) {
                author = caps.get(1).map(|g| g.as_str().trim().to_string());
            }
        }
        content = content[m.end()..].to_string();
    }
    for re in [&*DATELINE_COLOMBO_RE, &*DATELINE_SHORT_RE, &*DATELINE_NEWS1ST_RE] {
        if let Some(m) = re.find(&content) {
            content = content[m.end()..].to_string();
            break;
        }
    }

    let excerpt = extract_excerpt(&content);
    let language = text::detect_language(&content).as_code().to_string();

    Some(ScrapedArticle {
        title,
        content,
        excerpt,
        author,
        published_at,
        image_url,
        final_url: final_url.to_string(),
        language,
    })
}

fn collect_meta_tags(document: &Html) -> HashMap<String, String> {
    let selector = Selector::parse("meta").expect("valid meta selector");
    let mut metas = HashMap::new();
    for el in document.select(&selector) {
        let name = el
            .value()
            .attr("property")
            .or_else(|| el.value().attr("name"));
        let content = el.value().attr("content");
        if let (Some(name), Some(content)) = (name, content) {
            if !content.is_empty() {
                metas.insert(name.to_string(), content.to_string());
            }
        }
    }
    metas
}

fn try_selectors(document: &Html, selectors: &[String]) -> Option<String> {
    for css in selectors {
        let Ok(selector) = Selector::parse(css) else {
            warn!(css, "extract: invalid selector, skipping");
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            let text: String = el.text().collect::<Vec<_>>().join(" ");
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn try_selectors_attr(document: &Html, selectors: &[String], attr: &str) -> Option<String> {
    for css in selectors {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            if let Some(val) = el.value().attr(attr) {
                let trimmed = val.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

/// Daily Mirror embeds the author as `<p><em><strong>By Author</strong></em></p>`
/// within the first few paragraphs rather than a dedicated byline element.
fn inline_author_fallback(document: &Html) -> Option<String> {
    let container = Selector::parse(".a-content, .article-body, .entry-content, article").ok()?;
    let para = Selector::parse("p").ok()?;
    let content_el = document.select(&container).next()?;
    for p in content_el.select(&para).take(5) {
        let text: String = p.text().collect::<Vec<_>>().join(" ");
        let trimmed = text.trim();
        if let Some(caps) = INLINE_AUTHOR_PARA_RE.captures(trimmed) {
            return caps.get(1).map(|g| g.as_str().trim().to_string());
        }
    }
    None
}

/// Daily Mirror's publish date sits inside an `<a>` whose hidden `<span>`
/// reads "Published :" ahead of the actual date text.
fn published_link_fallback(document: &Html) -> Option<String> {
    let link = Selector::parse("a.text-decoration-none").ok()?;
    let span = Selector::parse("span").ok()?;
    for a in document.select(&link) {
        if let Some(s) = a.select(&span).next() {
            let span_text: String = s.text().collect();
            if span_text.to_lowercase().contains("published") {
                let full: String = a.text().collect::<Vec<_>>().join(" ");
                let published_re = regex::Regex::new(r"(?i)Published\s*:\s*").unwrap();
                return Some(published_re.replace(&full, "").trim().to_string());
            }
        }
    }
    None
}

fn article_area_text(document: &Html) -> String {
    let blocklist = Selector::parse(BODY_TEXT_BLOCKLIST).expect("valid body blocklist selector");
    for css in ARTICLE_AREA_SELECTORS {
        if let Ok(selector) = Selector::parse(css) {
            if let Some(el) = document.select(&selector).next() {
                let text = clean_text(el, &blocklist);
                return text.chars().take(3000).collect();
            }
        }
    }
    let body_selector = Selector::parse("body").expect("valid body selector");
    document
        .select(&body_selector)
        .next()
        .map(|el| clean_text(el, &blocklist).chars().take(3000).collect())
        .unwrap_or_default()
}

/// Concatenate `el`'s text nodes, skipping any subtree whose root matches
/// `blocklist`. `scraper`'s parsed tree is read-only, so rather than
/// cloning-and-removing nodes as a live DOM would, this walks the subtree
/// once and excludes blocked node ids by membership test.
fn clean_text(el: ElementRef, blocklist: &Selector) -> String {
    let blocked: std::collections::HashSet<_> = el
        .select(blocklist)
        .flat_map(|matched| matched.descendants().map(|d| d.id()))
        .collect();

    let mut out = String::new();
    for node in el.descendants() {
        if blocked.contains(&node.id()) {
            continue;
        }
        if let scraper::Node::Text(t) = node.value() {
            out.push_str(t);
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First paragraph-like line long enough and not itself a byline/credit, as
/// the article's excerpt.
fn extract_excerpt(content: &str) -> Option<String> {
    for line in content.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("![") || trimmed.starts_with("---") {
            continue;
        }
        if trimmed.chars().count() < 40 {
            continue;
        }
        if EXCERPT_SKIP_RE.is_match(trimmed) {
            continue;
        }
        return Some(trimmed.chars().take(EXCERPT_MAX_LEN).collect());
    }
    (!content.is_empty()).then(|| content.chars().take(EXCERPT_MAX_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootsignal_common::source::Selectors;

    fn profile_with(content_selectors: Vec<&str>) -> SourceProfile {
        let yaml = format!(
            "name: Test Source\n\
             url: https://news.example.com\n\
             language: en\n\
             selectors:\n\
               title: [\"h1\"]\n\
               author: [\".byline\"]\n\
               date: [\"time[datetime]\"]\n\
               content: [{}]\n\
               image: [\"article img\"]\n",
            content_selectors
                .iter()
                .map(|s| format!("\"{s}\""))
                .collect::<Vec<_>>()
                .join(", ")
        );
        serde_yaml::from_str(&yaml).expect("valid test profile yaml")
    }

    #[test]
    fn extracts_title_author_date_content() {
        let html = r#"
            <html><head>
                <meta property="og:title" content="Fallback title">
            </head><body>
                <h1>Real Headline</h1>
                <span class="byline">Jane Reporter</span>
                <time datetime="2026-02-04T14:39:00+05:30">4 Feb</time>
                <article class="article-body">
                    <p>This is the opening paragraph of the article and it is long enough
                    to pass the minimum content length threshold imposed on selector
                    matches by the extraction routine, so it should be kept in full.</p>
                </article>
            </body></html>
        "#;
        let profile = profile_with(vec![".article-body"]);
        let article = extract_article(html, "https://news.example.com/a/1", &profile, None).unwrap();
        assert_eq!(article.title, "Real Headline");
        assert_eq!(article.author.as_deref(), Some("Jane Reporter"));
        assert!(article.content.contains("opening paragraph"));
    }

    #[test]
    fn strips_blocklisted_subtrees_from_content() {
        let html = r#"
            <html><body>
                <article class="article-body">
                    <nav>Home | World | Sport</nav>
                    <p>Genuine article text that easily clears the two hundred character
                    minimum imposed on a selector match before it is accepted as the
                    article's content rather than falling back to the full document body
                    text, which would otherwise pull in navigation chrome too.</p>
                    <div class="share-buttons">Share on Facebook</div>
                </article>
            </body></html>
        "#;
        let profile = profile_with(vec![".article-body"]);
        let article = extract_article(html, "https://news.example.com/a/2", &profile, None).unwrap();
        assert!(!article.content.contains("Home | World"));
        assert!(!article.content.contains("Share on Facebook"));
        assert!(article.content.contains("Genuine article text"));
    }

    #[test]
    fn too_short_content_returns_none() {
        let html = "<html><body><article class=\"article-body\"><p>Too short.</p></article></body></html>";
        let profile = profile_with(vec![".article-body"]);
        assert!(extract_article(html, "https://news.example.com/a/3", &profile, None).is_none());
    }

    #[test]
    fn strips_byline_prefix_from_content() {
        let html = r#"
            <html><body>
                <article class="article-body">
                    <p>By D.G. Sugathapala
                    Colombo correspondents filed this lengthy report on the unfolding
                    situation, providing more than enough characters to clear the
                    minimum content threshold enforced before acceptance.</p>
                </article>
            </body></html>
        "#;
        let profile = profile_with(vec![".article-body"]);
        let article = extract_article(html, "https://news.example.com/a/4", &profile, None).unwrap();
        assert!(!article.content.trim_start().starts_with("By D.G. Sugathapala"));
    }
}
