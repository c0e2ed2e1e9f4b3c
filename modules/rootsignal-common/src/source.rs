use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::RootSignalError;

/// Ordered CSS-selector lists used by the scraper, one list per field. The
/// extraction routine tries each selector in order and keeps the first that
/// yields non-empty text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selectors {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub date: Vec<String>,
    #[serde(default)]
    pub author: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
}

/// A homepage/listing descriptor for link discovery and, optionally,
/// paginated archive crawling.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    pub listing_url: String,
    pub archive_pattern: Option<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_page_start")]
    pub page_start: u32,
    #[serde(default = "default_page_step")]
    pub page_step: u32,
}

fn default_max_pages() -> u32 {
    50
}
fn default_page_start() -> u32 {
    1
}
fn default_page_step() -> u32 {
    1
}

/// `{url_pattern (with {nid}), start, end, max_consecutive_404}`.
#[derive(Debug, Clone, Deserialize)]
pub struct NidSweepConfig {
    pub url_pattern: String,
    pub start: i64,
    pub end: i64,
    #[serde(default = "default_max_consecutive_404")]
    pub max_consecutive_404: u32,
}

fn default_max_consecutive_404() -> u32 {
    10
}

/// `{url_pattern (with {date}), date_format, start_date}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DateSweepConfig {
    pub url_pattern: String,
    pub date_format: String,
    pub start_date: chrono::NaiveDate,
}

/// Per-source scheduler hints.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_rate_limit_ms() -> u64 {
    2_000
}
fn default_max_concurrency() -> usize {
    2
}
fn default_priority() -> i32 {
    100
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit_ms(),
            max_concurrency: default_max_concurrency(),
            priority: default_priority(),
        }
    }
}

/// The full per-source extraction/scheduling profile, as loaded from one
/// entry of the YAML document keyed by slug (§6). Pure data — there is
/// exactly one `SourceProfile` type, never a per-source subtype.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceProfile {
    pub name: String,
    pub url: String,
    pub rss_url: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub date_meta_tags: Vec<String>,
    #[serde(default)]
    pub article_url_patterns: Vec<String>,
    #[serde(default)]
    pub skip_url_patterns: Vec<String>,

    #[serde(default)]
    pub sections: HashMap<String, SectionConfig>,
    #[serde(default)]
    pub nid_sweep: Vec<NidSweepConfig>,
    pub date_sweep: Option<DateSweepConfig>,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// True for sources whose anti-bot challenge is per-session: a fresh
    /// browsing context is used for every navigation instead of one shared
    /// context per source. Defaults to true for sources without a feed URL,
    /// mirroring the observation that Cloudflare-gated sources tend to lack
    /// working RSS.
    pub needs_fresh_context: Option<bool>,
}

fn default_language() -> String {
    "en".to_string()
}

impl SourceProfile {
    pub fn needs_fresh_context(&self) -> bool {
        self.needs_fresh_context
            .unwrap_or_else(|| self.rss_url.is_none())
    }
}

/// The YAML document as a whole: a map of slug -> profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SourcesDocument(HashMap<String, SourceProfile>);

impl SourcesDocument {
    /// Parse a per-source YAML document keyed by slug (§6).
    pub fn parse(yaml: &str) -> Result<Self, RootSignalError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RootSignalError::Config(format!("invalid sources.yaml: {e}")))
    }

    /// Load once from disk at process start.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RootSignalError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            RootSignalError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&yaml)
    }

    pub fn get(&self, slug: &str) -> Option<&SourceProfile> {
        self.0.get(slug)
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceProfile)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
ada-derana-en:
  name: "Ada Derana English"
  url: "https://www.adaderana.lk"
  rss_url: "https://www.adaderana.lk/rss.php"
  language: en
  selectors:
    title: ["h1.news-title"]
    content: [".news-content"]
    date: [".news-datestamp"]
  date_meta_tags: ["article:published_time"]
  article_url_patterns: ["/news/\\d+"]
  skip_url_patterns: ["\\.jpg$", "/tag/"]
  sections:
    news:
      listing_url: "https://www.adaderana.lk/news"
      archive_pattern: "https://www.adaderana.lk/news/page/{page}"
      max_pages: 20
  nid_sweep:
    - url_pattern: "https://www.adaderana.lk/news.php?nid={nid}"
      start: 1
      end: 100
      max_consecutive_404: 5
  scheduling:
    rate_limit_ms: 500
    max_concurrency: 3
    priority: 10
"#;

    #[test]
    fn parses_full_profile() {
        let doc = SourcesDocument::parse(SAMPLE).unwrap();
        let p = doc.get("ada-derana-en").unwrap();
        assert_eq!(p.name, "Ada Derana English");
        assert_eq!(p.scheduling.rate_limit_ms, 500);
        assert_eq!(p.scheduling.priority, 10);
        assert_eq!(p.nid_sweep.len(), 1);
        assert_eq!(p.nid_sweep[0].max_consecutive_404, 5);
        assert!(!p.needs_fresh_context());
    }

    #[test]
    fn defaults_apply_when_fields_missing() {
        let yaml = r#"
minimal:
  name: "Minimal"
  url: "https://example.com"
"#;
        let doc = SourcesDocument::parse(yaml).unwrap();
        let p = doc.get("minimal").unwrap();
        assert_eq!(p.language, "en");
        assert_eq!(p.scheduling.rate_limit_ms, 2_000);
        assert_eq!(p.scheduling.max_concurrency, 2);
        assert!(p.needs_fresh_context(), "no rss_url implies fresh context");
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(SourcesDocument::parse("not: [valid").is_err());
    }
}
