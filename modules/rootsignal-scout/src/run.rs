//! Live `run` subcommand (§4.7/§4.9): discover fresh candidates for every
//! active source via its feed, listing sections, and first archive page,
//! then drain them through the shared autoscaling scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use rootsignal_archive::discovery::feed::FeedDiscoverer;
use rootsignal_archive::discovery::listing::discover_listings;
use rootsignal_archive::{ArchiveStore, PageBackend};
use rootsignal_common::Config;
use tracing::{info, warn};

use crate::ingest::{build_work_fn, filter_candidates, new_live_title_set, SourceContext, RUN_DEDUP_WINDOW_DAYS};
use crate::scheduler::Scheduler;

/// Discover and schedule every source in `contexts`, running discovery
/// concurrently with the scheduler's drain (§4.9: "Discovery producers run
/// concurrently with consumption") rather than waiting for every source to
/// finish discovery before a single worker starts. Each source's discovery
/// task streams its candidates in via `enqueue_all` and marks itself done
/// as soon as it finishes, so the scheduler's `discovery_done` bookkeeping
/// does real work instead of always seeing every source pre-finished.
pub async fn run_once(
    config: &Config,
    backend: Arc<PageBackend>,
    store: ArchiveStore,
    contexts: Vec<SourceContext>,
) -> Result<rootsignal_common::RunSummary> {
    let scheduler = Scheduler::new();
    let mut by_slug = HashMap::new();
    let feed_discoverer = Arc::new(FeedDiscoverer::new());

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

    let feed_min_year = config.feed_min_year;
    let discovery_handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            let backend = backend.clone();
            let store = store.clone();
            let scheduler = scheduler.clone();
            let feed_discoverer = feed_discoverer.clone();
            tokio::spawn(async move {
                let slug = ctx.source.slug.clone();
                let mut candidates = Vec::new();

                if let Some(rss_url) = &ctx.source.rss_url {
                    match feed_discoverer.discover(rss_url, feed_min_year).await {
                        Ok(items) => candidates.extend(items),
                        Err(e) => warn!(slug, error = %e, "run: feed discovery failed"),
                    }
                }

                if !ctx.profile.sections.is_empty() {
                    match backend.new_context() {
                        Ok(fetch_ctx) => match discover_listings(&backend, &fetch_ctx, &ctx.profile).await {
                            Ok(items) => candidates.extend(items),
                            Err(e) => warn!(slug, error = %e, "run: listing discovery failed"),
                        },
                        Err(e) => warn!(slug, error = %e, "run: failed to open listing context"),
                    }
                }

                info!(slug, found = candidates.len(), "run: discovery complete for source");

                let filtered = filter_candidates(&store, ctx.source.id, candidates, RUN_DEDUP_WINDOW_DAYS)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(slug, error = %e, "run: dedup filter failed, scheduling nothing");
                        Vec::new()
                    });

                let scheduled = filtered.len();
                scheduler.enqueue_all(&slug, filtered).await;
                scheduler.mark_discovery_done(&slug).await;
                info!(slug, scheduled, "run: source queued");
            })
        })
        .collect();

    let work_fn = build_work_fn(backend, store, Arc::new(by_slug), new_live_title_set());

    // Discovery and scheduler drain run concurrently: the scheduler starts
    // dispatching workers against whatever's already enqueued the moment it
    // is invoked, rather than waiting for every source to finish discovery.
    let (summary, discovery_results) =
        tokio::join!(scheduler.run(config.initial_concurrency, work_fn), join_all(discovery_handles));
    for result in discovery_results {
        if let Err(e) = result {
            warn!(error = %e, "run: a discovery task panicked");
        }
    }

    Ok(summary)
}
