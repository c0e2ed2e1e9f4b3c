//! One-off sweep entrypoints (§4.7): sequential-id and calendar-date
//! sweeps run their own per-source loop at reduced concurrency rather than
//! joining the shared scheduler, since both are already bounded by a
//! single source's `max_consecutive_404`/date range and don't benefit from
//! cross-source fairness.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rootsignal_archive::discovery::date_sweep::discover_date_range;
use rootsignal_archive::discovery::nid_sweep::run_nid_sweep;
use rootsignal_archive::{ArchiveStore, PageBackend};
use rootsignal_common::text;
use tracing::{debug, info, warn};

use crate::ingest::{filter_candidates, SourceContext, BACKFILL_DEDUP_WINDOW_DAYS};
use crate::rate_limit::RateLimiter;

/// Sweep every `nid_sweep` range configured for `ctx.source`, inserting
/// each surviving article directly (the sweep already scrapes inline —
/// see [`rootsignal_archive::discovery::nid_sweep`]) and recording
/// failures to the dead-link registry exactly like a scheduled worker
/// would.
pub async fn run_nid_sweep_for_source(
    backend: &PageBackend,
    store: &ArchiveStore,
    ctx: &SourceContext,
) -> Result<rootsignal_common::RunSummary> {
    let mut summary = rootsignal_common::RunSummary::default();
    let limiter = RateLimiter::new(ctx.profile.scheduling.rate_limit_ms);

    let already_known = store.all_source_urls(ctx.source.id).await?;
    let suppressed = store.all_suppressed(ctx.source.id, Utc::now()).await?;
    let mut already_known = already_known;
    already_known.extend(suppressed);

    for config in &ctx.profile.nid_sweep {
        limiter.wait().await;
        let outcome = run_nid_sweep(backend, &ctx.profile, config, &already_known)
            .await
            .with_context(|| format!("nid sweep failed for {}", ctx.source.slug))?;

        info!(
            slug = %ctx.source.slug,
            attempted = outcome.attempted,
            successes = outcome.successes.len(),
            errors = outcome.errors.len(),
            aborted_early = outcome.aborted_early,
            "nid sweep: range complete"
        );

        for article in outcome.successes {
            if article.published_at.is_none() {
                summary.skipped_no_date += 1;
                continue;
            }
            if let Err(e) = store.remove_dead_link(&article.final_url).await {
                warn!(url = %article.final_url, error = %e, "nid sweep: failed clearing dead link");
            }
            match store
                .insert_article(ctx.source.id, &article.final_url, &article)
                .await
            {
                Ok(Some(_)) => summary.inserted += 1,
                Ok(None) => summary.skipped_duplicate += 1,
                Err(e) => warn!(url = %article.final_url, error = %e, "nid sweep: insert failed"),
            }
        }

        for err in outcome.errors {
            if let Err(e) = store.record_dead_link(ctx.source.id, &err.url, err.kind.as_db_str()).await {
                warn!(url = %err.url, error = %e, "nid sweep: failed recording dead link");
            }
            summary.record_error(err.kind);
        }
    }

    Ok(summary)
}

/// Walk `ctx.source`'s configured `date_sweep` range, collecting every
/// day's article candidates, then scrape and persist them at the source's
/// own rate limit. Unlike the nid sweep, discovery here only yields
/// candidate URLs — actual scraping is a second pass, since the archive
/// URL template (not the resulting article URL) is what's walked.
pub async fn run_date_sweep_for_source(
    backend: Arc<PageBackend>,
    store: ArchiveStore,
    ctx: SourceContext,
) -> Result<rootsignal_common::RunSummary> {
    let mut summary = rootsignal_common::RunSummary::default();
    let Some(config) = ctx.profile.date_sweep.clone() else {
        return Ok(summary);
    };

    let today = Utc::now().date_naive();
    let candidates = discover_date_range(&backend, &ctx.profile, &config, today).await?;
    info!(slug = %ctx.source.slug, found = candidates.len(), "date sweep: discovery complete");

    let filtered = filter_candidates(&store, ctx.source.id, candidates, BACKFILL_DEDUP_WINDOW_DAYS).await?;
    info!(slug = %ctx.source.slug, scheduled = filtered.len(), "date sweep: scraping filtered candidates");

    let limiter = RateLimiter::new(ctx.profile.scheduling.rate_limit_ms);
    let fetch_ctx = backend.new_context()?;

    for item in filtered {
        limiter.wait().await;
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
                    summary.skipped_no_date += 1;
                    continue;
                }
                if let Err(e) = store.remove_dead_link(&article.final_url).await {
                    warn!(url = %article.final_url, error = %e, "date sweep: failed clearing dead link");
                }
                match store
                    .insert_article(ctx.source.id, &article.final_url, &article)
                    .await
                {
                    Ok(Some(_)) => summary.inserted += 1,
                    Ok(None) => summary.skipped_duplicate += 1,
                    Err(e) => warn!(url = %article.final_url, error = %e, "date sweep: insert failed"),
                }
            }
            Err(err) => {
                if let Err(e) = store.record_dead_link(ctx.source.id, &err.url, err.kind.as_db_str()).await {
                    warn!(url = %err.url, error = %e, "date sweep: failed recording dead link");
                }
                summary.record_error(err.kind);
            }
        }
    }

    Ok(summary)
}
