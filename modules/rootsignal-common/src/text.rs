// Unicode-safe text normalization shared by every scrape and discoverer.

use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

/// Zero-width joiner / non-joiner — essential to Sinhala and Tamil conjunct
/// consonants. Stripping either corrupts the script, so title normalization
/// preserves them explicitly.
const ZWJ: char = '\u{200D}';
const ZWNJ: char = '\u{200C}';

/// Titles normalizing to this length or shorter are too generic to use as a
/// dedup key (§4.3, §9 heuristic — not tuned further).
pub const MIN_DEDUP_TITLE_LEN: usize = 10;

/// A small fixed table of common mojibake sequences (UTF-8 bytes misread as
/// Latin-1/Windows-1252 and re-encoded) seen in scraped Sri Lankan news HTML.
static MOJIBAKE_TABLE: &[(&str, &str)] = &[
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "\u{2013}"),
    ("â€”", "\u{2014}"),
    ("â€¦", "\u{2026}"),
    ("Ã©", "é"),
    ("Â ", " "),
];

static WHITESPACE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\s+").expect("valid regex"));

/// NFC compose → HTML entity decode → mojibake repair → collapse whitespace
/// to a single ASCII space, trimmed. Idempotent.
pub fn normalize_text(input: &str) -> String {
    let composed: String = input.nfc().collect();
    let decoded = html_escape::decode_html_entities(&composed).into_owned();
    let mut repaired = decoded;
    for (bad, good) in MOJIBAKE_TABLE {
        if repaired.contains(bad) {
            repaired = repaired.replace(bad, good);
        }
    }
    WHITESPACE_RE.replace_all(repaired.trim(), " ").into_owned()
}

/// NFC → lowercase → strip all code points that are not letters, digits,
/// ZWJ, or ZWNJ. Idempotent; preserves U+200C/U+200D.
pub fn normalize_title(input: &str) -> String {
    let composed: String = input.nfc().collect();
    let lowered = composed.to_lowercase();
    lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ZWJ || *c == ZWNJ)
        .collect()
}

/// Whether a normalized title is usable as a dedup key (§4.3, §9).
pub fn is_dedup_eligible(normalized_title: &str) -> bool {
    normalized_title.chars().count() > MIN_DEDUP_TITLE_LEN
}

/// Detected language, limited to the two this system routes metadata for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Sinhala,
    English,
}

impl Language {
    pub fn as_code(self) -> &'static str {
        match self {
            Language::Sinhala => "si",
            Language::English => "en",
        }
    }
}

const SINHALA_COMMON_WORDS: &[&str] =
    &["සහ", "හා", "ඇති", "කළ", "බව", "මෙම", "ඒ", "අද", "එම", "නව"];

/// Sample the first 500 code points; classify Sinhala if >=10% fall in the
/// Sinhala Unicode block, else if a common Sinhala word appears among the
/// first 50 space-delimited tokens, else English.
pub fn detect_language(text: &str) -> Language {
    let sample: Vec<char> = text.chars().take(500).collect();
    if sample.is_empty() {
        return Language::English;
    }
    let sinhala_count = sample
        .iter()
        .filter(|c| ('\u{0D80}'..='\u{0DFF}').contains(*c))
        .count();
    if sinhala_count as f64 / sample.len() as f64 >= 0.10 {
        return Language::Sinhala;
    }

    let tokens: Vec<&str> = text.split_whitespace().take(50).collect();
    if tokens
        .iter()
        .any(|t| SINHALA_COMMON_WORDS.contains(t))
    {
        return Language::Sinhala;
    }

    Language::English
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_whitespace() {
        assert_eq!(normalize_text("hello   \n\t world"), "hello world");
    }

    #[test]
    fn normalize_text_decodes_entities() {
        assert_eq!(normalize_text("Tom &amp; Jerry"), "Tom & Jerry");
    }

    #[test]
    fn normalize_text_is_idempotent() {
        let input = "Colombo  &amp;   Kandy\u{00A0}news";
        let once = normalize_text(input);
        let twice = normalize_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_title_lowercases_and_strips_punctuation() {
        assert_eq!(
            normalize_title("Sri Lanka's Economy Shows Growth"),
            normalize_title("Sri Lanka's Economy Shows Growth!")
        );
    }

    #[test]
    fn normalize_title_preserves_zwj() {
        let input = "\u{0DC1}\u{0DBA}\u{0DCA}\u{200D}\u{0DBB}\u{0DD3} \u{0DBD}\u{0D82}\u{0D9A}\u{0DCF}\u{0DC0}";
        let normalized = normalize_title(input);
        assert!(normalized.contains(ZWJ));
    }

    #[test]
    fn normalize_title_is_idempotent() {
        let input = "Sri Lanka's Economy Shows Growth!";
        let once = normalize_title(input);
        let twice = normalize_title(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn short_normalized_title_not_dedup_eligible() {
        assert!(!is_dedup_eligible(&normalize_title("Breaking")));
        assert!(is_dedup_eligible(&normalize_title(
            "Sri Lanka's Economy Shows Growth"
        )));
    }

    #[test]
    fn detects_sinhala_by_script() {
        let text = "ශ්‍රී ලංකාව නව ආර්ථික වර්ධනයක් පෙන්නුම් කරයි";
        assert_eq!(detect_language(text), Language::Sinhala);
    }

    #[test]
    fn detects_english() {
        let text = "Sri Lanka's economy shows growth this quarter";
        assert_eq!(detect_language(text), Language::English);
    }
}
