//! Scrape-and-persist bridge: the one closure that turns a scheduler
//! `(source, CandidateItem)` pick into a [`crate::scheduler::WorkOutcome`],
//! and the dedup pre-filter that decides what's worth enqueuing in the
//! first place. Both halves share the same `ArchiveStore` handle, so a
//! title dedup'd out here never costs a navigation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rootsignal_archive::{ArchiveStore, PageBackend};
use rootsignal_common::source::SourceProfile;
use rootsignal_common::{text, CandidateItem, ScrapeErrorKind, Source};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::scheduler::WorkOutcome;

/// The "live in-memory recent-title set for the run" (§4.8): normalized
/// titles already inserted this run, keyed by source. Checked and updated
/// under [`PersistenceLock`] around the same critical section as the
/// insert itself, so two workers racing to insert near-duplicate titles
/// under different URLs can't both land — the one that loses the race
/// sees its own title already present and is counted as a duplicate
/// instead.
pub type LiveTitleSet = Arc<Mutex<HashMap<Uuid, HashSet<String>>>>;

pub fn new_live_title_set() -> LiveTitleSet {
    Arc::new(Mutex::new(HashMap::new()))
}

/// In-run dedup window: a title seen in the last 7 days suppresses a
/// same-run duplicate without a second navigation (§4.3). Backfills use a
/// longer [`BACKFILL_DEDUP_WINDOW_DAYS`] window since they replay much
/// older archive pages where near-duplicate reposts are more common.
pub const RUN_DEDUP_WINDOW_DAYS: i64 = 7;
pub const BACKFILL_DEDUP_WINDOW_DAYS: i64 = 365;

/// Everything the dedup filter and the per-item worker need that doesn't
/// change across a run: the source row, its loaded profile, and the shared
/// backend/store handles.
#[derive(Clone)]
pub struct SourceContext {
    pub source: Source,
    pub profile: SourceProfile,
}

/// Filter `candidates` down to the ones worth scheduling: drop anything
/// whose URL already exists, whose URL is currently dead-link-suppressed,
/// or whose normalized title collides with one inserted inside
/// `dedup_window_days`. Candidates below [`text::MIN_DEDUP_TITLE_LEN`] skip
/// title dedup entirely and are kept unless the URL itself matches.
pub async fn filter_candidates(
    store: &ArchiveStore,
    source_id: Uuid,
    candidates: Vec<CandidateItem>,
    dedup_window_days: i64,
) -> anyhow::Result<Vec<CandidateItem>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
    let existing = store.existing_urls(source_id, &urls).await?;
    let suppressed = store.suppressed_subset(source_id, &urls, Utc::now()).await?;
    let recent_titles = store.recent_titles(source_id, dedup_window_days).await?;

    let mut seen_titles_this_run: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for candidate in candidates {
        if existing.contains(&candidate.url) || suppressed.contains(&candidate.url) {
            continue;
        }

        let normalized = text::normalize_title(&candidate.title);
        if text::is_dedup_eligible(&normalized) {
            if recent_titles.contains(&normalized) || seen_titles_this_run.contains(&normalized) {
                debug!(title = %candidate.title, "ingest: dropped as title duplicate");
                continue;
            }
            seen_titles_this_run.insert(normalized);
        }

        kept.push(candidate);
    }

    Ok(kept)
}

/// Build the scheduler work closure for one process run: scrape the
/// candidate's URL, persist on success, and fold the dead-link registry
/// update into the same outcome the scheduler already tracks for its
/// autoscaling error rate.
pub fn build_work_fn(
    backend: Arc<PageBackend>,
    store: ArchiveStore,
    sources_by_slug: Arc<std::collections::HashMap<String, SourceContext>>,
    live_titles: LiveTitleSet,
) -> crate::scheduler::WorkFn {
    Arc::new(move |slug: String, item: CandidateItem| {
        let backend = backend.clone();
        let store = store.clone();
        let sources_by_slug = sources_by_slug.clone();
        let live_titles = live_titles.clone();
        Box::pin(async move {
            let Some(ctx) = sources_by_slug.get(&slug) else {
                warn!(slug, "ingest: worker picked an unregistered source, dropping item");
                return WorkOutcome::Failed(ScrapeErrorKind::Unknown);
            };

            let fetch_ctx = match backend.new_context() {
                Ok(c) => c,
                Err(e) => {
                    warn!(slug, error = %e, "ingest: failed to open browsing context");
                    return WorkOutcome::Failed(ScrapeErrorKind::Unknown);
                }
            };

            match rootsignal_archive::scrape::scrape_article(
                &backend,
                &fetch_ctx,
                &item.url,
                &ctx.profile,
                item.hint_date,
            )
            .await
            {
                Ok(article) => {
                    if article.published_at.is_none() {
                        return WorkOutcome::SkippedNoDate;
                    }

                    let normalized_title = text::normalize_title(&article.title);
                    let title_eligible = text::is_dedup_eligible(&normalized_title);

                    // Persistence lock (§4.9/§5): held across the whole
                    // title-check/insert/title-update critical section so
                    // a concurrent near-duplicate-titled scrape of a
                    // different URL can't land alongside this one.
                    let mut titles = live_titles.lock().await;
                    let source_titles = titles.entry(ctx.source.id).or_default();
                    if title_eligible && source_titles.contains(&normalized_title) {
                        debug!(title = %article.title, "ingest: dropped as live duplicate");
                        return WorkOutcome::SkippedDuplicate;
                    }

                    if let Err(e) = store.remove_dead_link(&article.final_url).await {
                        warn!(url = %article.final_url, error = %e, "ingest: failed clearing dead link");
                    }
                    match store
                        .insert_article(ctx.source.id, &article.final_url, &article)
                        .await
                    {
                        Ok(Some(_)) => {
                            if title_eligible {
                                source_titles.insert(normalized_title);
                            }
                            WorkOutcome::Inserted
                        }
                        Ok(None) => WorkOutcome::SkippedDuplicate,
                        Err(e) => {
                            warn!(url = %article.final_url, error = %e, "ingest: insert failed");
                            WorkOutcome::Failed(ScrapeErrorKind::Unknown)
                        }
                    }
                }
                Err(err) => {
                    if let Err(e) = store
                        .record_dead_link(ctx.source.id, &err.url, err.kind.as_db_str())
                        .await
                    {
                        warn!(url = %err.url, error = %e, "ingest: failed recording dead link");
                    }
                    WorkOutcome::Failed(err.kind)
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_windows_match_spec_constants() {
        assert_eq!(RUN_DEDUP_WINDOW_DAYS, 7);
        assert_eq!(BACKFILL_DEDUP_WINDOW_DAYS, 365);
    }
}
