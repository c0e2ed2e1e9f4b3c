//! Multi-source paginated-archive backfill (§4.7): crawls every requested
//! source's configured archive pages concurrently and feeds the resulting
//! candidates into the same scheduler a live `run` uses, so a slow or
//! heavily-gated source's archive crawl never blocks a faster one's.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use rootsignal_archive::discovery::archive::crawl_archive_pages;
use rootsignal_archive::{ArchiveStore, PageBackend};
use tracing::{info, warn};

use crate::ingest::{
    build_work_fn, filter_candidates, new_live_title_set, SourceContext, BACKFILL_DEDUP_WINDOW_DAYS,
};
use crate::scheduler::Scheduler;

/// Crawl `max_pages` of archive history for every source in `contexts`,
/// concurrently with the scheduler's own drain (§4.9: "Discovery producers
/// run concurrently with consumption") rather than waiting for every
/// source's archive crawl to finish before a single worker starts.
pub async fn run_backfill(
    backend: Arc<PageBackend>,
    store: ArchiveStore,
    contexts: Vec<SourceContext>,
    max_pages: u32,
    concurrency: usize,
) -> Result<rootsignal_common::RunSummary> {
    let scheduler = Scheduler::new();
    let mut by_slug = HashMap::new();

    for ctx in &contexts {
        scheduler
            .register_source(
                ctx.source.slug.clone(),
                ctx.profile.scheduling.rate_limit_ms,
                ctx.profile.scheduling.max_concurrency,
                ctx.profile.scheduling.priority,
            )
            .await;
        by_slug.insert(ctx.source.slug.clone(), ctx.clone());
    }

    let discovery_handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            let backend = backend.clone();
            let store = store.clone();
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                let slug = ctx.source.slug.clone();
                let result = crawl_archive_pages(&backend, &ctx.profile, max_pages).await;
                let candidates = match result {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(slug, error = %e, "backfill: archive crawl failed for source");
                        scheduler.mark_discovery_done(&slug).await;
                        return;
                    }
                };
                info!(slug, found = candidates.len(), "backfill: archive crawl complete");

                let filtered = filter_candidates(
                    &store,
                    ctx.source.id,
                    candidates,
                    BACKFILL_DEDUP_WINDOW_DAYS,
                )
                .await
                .unwrap_or_else(|e| {
                    warn!(slug, error = %e, "backfill: dedup filter failed, scheduling unfiltered");
                    Vec::new()
                });

                let scheduled = filtered.len();
                scheduler.enqueue_all(&slug, filtered).await;
                scheduler.mark_discovery_done(&slug).await;
                info!(slug, scheduled, "backfill: source queued");
            })
        })
        .collect();

    let work_fn = build_work_fn(backend, store, Arc::new(by_slug), new_live_title_set());

    let (summary, discovery_results) =
        tokio::join!(scheduler.run(concurrency, work_fn), join_all(discovery_handles));
    for result in discovery_results {
        if let Err(e) = result {
            warn!(error = %e, "backfill: a discovery task panicked");
        }
    }

    Ok(summary)
}
