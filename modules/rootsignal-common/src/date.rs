//! Five-tier date extraction waterfall shared by every scrape (§4.4).
//!
//! Given a meta-tag date, a selector-extracted date string, the article
//! URL, a body-text snippet, and a feed hint date, returns the first valid
//! timestamp from, in order: meta, selector text, URL path, body text, feed
//! hint. A naive (timezone-less) parse is assigned the Sri Lanka offset
//! (UTC+05:30) before validation.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Sri Lanka's fixed offset. Used whenever a parsed timestamp carries no
/// zone information of its own.
pub fn sri_lanka_tz() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("valid fixed offset")
}

const MIN_YEAR: i32 = 2006;

fn months_pattern() -> &'static str {
    "January|February|March|April|May|June|July|August|September|October|November|December"
}

fn months_short_pattern() -> &'static str {
    "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec"
}

fn ci(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("valid regex")
}

static PAT_LONG: LazyLock<Regex> = LazyLock::new(|| {
    ci(&format!(
        r"\b({})\s+(\d{{1,2}}),?\s+(\d{{4}})\s+(\d{{1,2}}:\d{{2}}\s*(?:am|pm))",
        months_pattern()
    ))
});

static PAT_DATE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    ci(&format!(
        r"\b({})\s+(\d{{1,2}}),?\s+(\d{{4}})\b",
        months_pattern()
    ))
});

static PAT_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[-./](\d{2})[-./](\d{2})\b").expect("valid regex"));

static PAT_DMY_LONG_TIME: LazyLock<Regex> = LazyLock::new(|| {
    ci(&format!(
        r"\b(\d{{1,2}})\s+({}|{})\s+(\d{{4}})\s+(\d{{1,2}}:\d{{2}}\s*(?:am|pm))",
        months_pattern(),
        months_short_pattern()
    ))
});

static PAT_DMY_LONG: LazyLock<Regex> = LazyLock::new(|| {
    ci(&format!(
        r"\b(\d{{1,2}})\s+({}|{})\s+(\d{{4}})\b",
        months_pattern(),
        months_short_pattern()
    ))
});

static PAT_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").expect("valid regex"));

static PAT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").expect("valid regex"));

fn is_valid(dt: DateTime<Utc>) -> bool {
    use chrono::Datelike;
    dt.year() >= MIN_YEAR && dt <= Utc::now() + chrono::Duration::days(2)
}

fn assign_sri_lanka(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    sri_lanka_tz()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a strict meta-tag or RSS `pubDate` style string. Tries ISO 8601
/// variants (with and without an explicit offset) then RFC 2822.
fn safe_parse(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            let utc = dt.with_timezone(&Utc);
            if is_valid(utc) {
                return Some(utc);
            }
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            if let Some(utc) = assign_sri_lanka(naive) {
                if is_valid(utc) {
                    return Some(utc);
                }
            }
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        let utc = dt.with_timezone(&Utc);
        if is_valid(utc) {
            return Some(utc);
        }
    }

    None
}

fn parse_long_month_time(month: &str, day: &str, year: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{month} {day}, {year} {}", time.trim());
    let naive = NaiveDateTime::parse_from_str(&combined, "%B %d, %Y %I:%M %p").ok()?;
    assign_sri_lanka(naive).filter(|dt| is_valid(*dt))
}

fn parse_long_month(month: &str, day: &str, year: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{month} {day}, {year}");
    let naive = NaiveDate::parse_from_str(&combined, "%B %d, %Y")
        .ok()?
        .and_hms_opt(0, 0, 0)?;
    assign_sri_lanka(naive).filter(|dt| is_valid(*dt))
}

fn parse_iso_triplet(year: &str, month: &str, day: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    assign_sri_lanka(naive).filter(|dt| is_valid(*dt))
}

fn parse_dmy_long_time(day: &str, month: &str, year: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{day} {month} {year} {}", time.trim());
    for fmt in ["%d %B %Y %I:%M %p", "%d %b %Y %I:%M %p"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&combined, fmt) {
            if let Some(utc) = assign_sri_lanka(naive).filter(|dt| is_valid(*dt)) {
                return Some(utc);
            }
        }
    }
    None
}

fn parse_dmy_long(day: &str, month: &str, year: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{day} {month} {year}");
    for fmt in ["%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&combined, fmt) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                if let Some(utc) = assign_sri_lanka(naive).filter(|dt| is_valid(*dt)) {
                    return Some(utc);
                }
            }
        }
    }
    None
}

fn parse_dmy_slash(day: &str, month: &str, year: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    assign_sri_lanka(naive).filter(|dt| is_valid(*dt))
}

/// Scan free text for a human-readable date using the six-pattern regex
/// waterfall, returning the first match that parses into a valid date.
pub fn extract_date_from_text(text: &str) -> Option<DateTime<Utc>> {
    if let Some(c) = PAT_LONG.captures(text) {
        if let Some(dt) = parse_long_month_time(&c[1], &c[2], &c[3], &c[4]) {
            return Some(dt);
        }
    }
    if let Some(c) = PAT_DATE_ONLY.captures(text) {
        if let Some(dt) = parse_long_month(&c[1], &c[2], &c[3]) {
            return Some(dt);
        }
    }
    if let Some(c) = PAT_ISO.captures(text) {
        if let Some(dt) = parse_iso_triplet(&c[1], &c[2], &c[3]) {
            return Some(dt);
        }
    }
    if let Some(c) = PAT_DMY_LONG_TIME.captures(text) {
        if let Some(dt) = parse_dmy_long_time(&c[1], &c[2], &c[3], &c[4]) {
            return Some(dt);
        }
    }
    if let Some(c) = PAT_DMY_LONG.captures(text) {
        if let Some(dt) = parse_dmy_long(&c[1], &c[2], &c[3]) {
            return Some(dt);
        }
    }
    if let Some(c) = PAT_DMY.captures(text) {
        if let Some(dt) = parse_dmy_slash(&c[1], &c[2], &c[3]) {
            return Some(dt);
        }
    }
    None
}

/// Extract a `/YYYY/MM/DD/` segment from an article URL.
pub fn extract_date_from_url(url: &str) -> Option<DateTime<Utc>> {
    let c = PAT_URL.captures(url)?;
    parse_iso_triplet(&c[1], &c[2], &c[3])
}

/// The full five-tier waterfall (§4.4). Returns the first valid timestamp
/// across meta, selector text, URL, body text (first 3,000 chars), then
/// feed hint.
pub fn extract_date_waterfall(
    meta_date: Option<&str>,
    selector_date: Option<&str>,
    url: &str,
    body_text: &str,
    feed_hint_date: Option<&str>,
) -> Option<DateTime<Utc>> {
    if let Some(meta) = meta_date {
        if let Some(dt) = safe_parse(meta) {
            return Some(dt);
        }
    }

    if let Some(sel) = selector_date {
        if let Some(dt) = extract_date_from_text(sel) {
            return Some(dt);
        }
    }

    if let Some(dt) = extract_date_from_url(url) {
        return Some(dt);
    }

    if !body_text.is_empty() {
        let budget: String = body_text.chars().take(3000).collect();
        if let Some(dt) = extract_date_from_text(&budget) {
            return Some(dt);
        }
    }

    if let Some(hint) = feed_hint_date {
        if let Some(dt) = safe_parse(hint) {
            return Some(dt);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn rejects_epoch_dates() {
        assert!(extract_date_from_text("Published 01/01/1970").is_none());
    }

    #[test]
    fn rejects_far_future_dates() {
        let future = Utc::now() + chrono::Duration::days(3);
        let text = format!("{}", future.format("%B %d, %Y"));
        assert!(extract_date_from_text(&text).is_none());
    }

    #[test]
    fn accepts_one_day_in_the_future() {
        let future = Utc::now() + chrono::Duration::days(1);
        let text = format!("{}", future.format("%B %d, %Y"));
        assert!(extract_date_from_text(&text).is_some());
    }

    #[test]
    fn long_month_with_time_waterfall_tier() {
        let dt = extract_date_waterfall(
            None,
            Some("February 4, 2026 02:39 pm"),
            "https://example.com/news/1",
            "",
            None,
        )
        .expect("should parse");
        assert_eq!(dt.year(), 2026);
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 4);
        assert_eq!(dt.with_timezone(&sri_lanka_tz()).hour_and_minute(), (14, 39));
    }

    #[test]
    fn url_path_tier_used_when_selector_absent() {
        let dt = extract_date_waterfall(None, None, "https://example.com/2026/02/04/article", "", None);
        assert!(dt.is_some());
    }

    #[test]
    fn body_text_tier_is_capped_at_3000_chars() {
        let padding = "x".repeat(3000);
        let text = format!("{padding}January 1, 2020");
        assert!(extract_date_from_text(&text[..3000.min(text.len())]).is_none());
    }

    #[test]
    fn dmy_slash_pattern_parses() {
        let dt = extract_date_from_text("Updated: 14/02/2026 evening");
        let dt = dt.expect("should parse dd/mm/yyyy");
        assert_eq!(dt.year(), 2026);
    }

    #[test]
    fn iso_dot_separated_parses() {
        let dt = extract_date_from_text("dated 2024.03.15 afternoon").expect("parses");
        assert_eq!(dt.year(), 2024);
    }

    trait HourMinute {
        fn hour_and_minute(&self) -> (u32, u32);
    }
    impl HourMinute for DateTime<FixedOffset> {
        fn hour_and_minute(&self) -> (u32, u32) {
            use chrono::Timelike;
            (self.hour(), self.minute())
        }
    }
}
