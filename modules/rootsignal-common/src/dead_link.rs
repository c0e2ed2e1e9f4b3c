//! Dead-link suppression policy (§4.2). The registry itself is persisted in
//! Postgres by `rootsignal-archive`; this module is the pure decision logic
//! shared by the persistence adapter and every discoverer's pre-filter.

use chrono::{DateTime, Utc};

use crate::types::{DeadLinkRecord, DEAD_LINK_BACKOFF_DAYS, DEAD_LINK_PERMANENT_THRESHOLD};

/// Whether a dead-link row currently suppresses its url from re-discovery.
///
/// Permanently suppressed once `retry_count >= 3`; otherwise suppressed
/// until `first_failed_at + backoff[retry_count]` has elapsed, with
/// `backoff = [7d, 14d, 30d]`.
pub fn is_suppressed(record: &DeadLinkRecord, now: DateTime<Utc>) -> bool {
    if record.retry_count >= DEAD_LINK_PERMANENT_THRESHOLD {
        return true;
    }
    let Some(&backoff_days) = DEAD_LINK_BACKOFF_DAYS.get(record.retry_count as usize) else {
        return true;
    };
    now < record.first_failed_at + chrono::Duration::days(backoff_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record_with(retry_count: i32, first_failed_at: DateTime<Utc>) -> DeadLinkRecord {
        DeadLinkRecord {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            url: "https://example.com/a".to_string(),
            error_type: "timeout".to_string(),
            first_failed_at,
            last_checked_at: first_failed_at,
            retry_count,
        }
    }

    #[test]
    fn permanent_after_three_retries() {
        let record = record_with(3, Utc::now() - chrono::Duration::days(365));
        assert!(is_suppressed(&record, Utc::now()));
    }

    #[test]
    fn suppressed_within_first_backoff_window() {
        let record = record_with(0, Utc::now() - chrono::Duration::days(1));
        assert!(is_suppressed(&record, Utc::now()));
    }

    #[test]
    fn eligible_for_retry_after_backoff_elapses() {
        let record = record_with(0, Utc::now() - chrono::Duration::days(8));
        assert!(!is_suppressed(&record, Utc::now()));
    }

    #[test]
    fn second_retry_uses_14_day_window() {
        let record = record_with(1, Utc::now() - chrono::Duration::days(10));
        assert!(is_suppressed(&record, Utc::now()));
        let record = record_with(1, Utc::now() - chrono::Duration::days(15));
        assert!(!is_suppressed(&record, Utc::now()));
    }

    #[test]
    fn third_retry_uses_30_day_window() {
        let record = record_with(2, Utc::now() - chrono::Duration::days(29));
        assert!(is_suppressed(&record, Utc::now()));
        let record = record_with(2, Utc::now() - chrono::Duration::days(31));
        assert!(!is_suppressed(&record, Utc::now()));
    }
}
