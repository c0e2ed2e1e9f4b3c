use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rootsignal_archive::{ArchiveStore, PageBackend};
use rootsignal_common::source::SourcesDocument;
use rootsignal_common::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rootsignal_scout::ingest::SourceContext;
use rootsignal_scout::{backfill, run, sweep};

#[derive(Parser)]
#[command(name = "rootsignal-scout", about = "Multi-source news ingestion scheduler")]
struct Cli {
    /// Restrict to one configured source slug instead of every active source.
    #[arg(long, global = true)]
    source: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover and scrape fresh articles for every active source.
    Run,
    /// Crawl each source's paginated archive and scrape everything found.
    Backfill {
        #[arg(long, default_value_t = 50)]
        pages: u32,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Sweep a source's configured sequential-id ranges.
    NidSweep,
    /// Sweep a source's configured calendar-date range.
    DateSweep,
    /// Print per-source article counts and latest publish dates.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rootsignal=info".parse()?))
        .init();

    info!("rootsignal-scout starting");

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store = ArchiveStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let backend = Arc::new(match &config.browser_endpoint {
        Some(endpoint) => PageBackend::browserless(endpoint, None, config.proxy_url.as_deref()),
        None => PageBackend::chrome(config.proxy_url.as_deref()),
    });

    let documents = SourcesDocument::load(&config.sources_config_path)
        .context("failed to load sources.yaml")?;

    let contexts = load_source_contexts(&store, &documents, cli.source.as_deref()).await?;
    if contexts.is_empty() {
        warn!("no matching active sources with a loaded profile, nothing to do");
        return Ok(());
    }

    match cli.command {
        Command::Run => {
            let summary = run::run_once(&config, backend, store, contexts).await?;
            info!(%summary, "run complete");
        }
        Command::Backfill { pages, concurrency } => {
            let summary = backfill::run_backfill(backend, store, contexts, pages, concurrency).await?;
            info!(%summary, "backfill complete");
        }
        Command::NidSweep => {
            let mut total = rootsignal_common::RunSummary::default();
            for ctx in &contexts {
                if ctx.profile.nid_sweep.is_empty() {
                    warn!(slug = %ctx.source.slug, "source has no nid_sweep configured, skipping");
                    continue;
                }
                let summary = sweep::run_nid_sweep_for_source(&backend, &store, ctx).await?;
                total.merge(&summary);
            }
            info!(%total, "nid sweep complete");
        }
        Command::DateSweep => {
            let mut total = rootsignal_common::RunSummary::default();
            for ctx in contexts {
                if ctx.profile.date_sweep.is_none() {
                    warn!(slug = %ctx.source.slug, "source has no date_sweep configured, skipping");
                    continue;
                }
                let summary = sweep::run_date_sweep_for_source(backend.clone(), store.clone(), ctx).await?;
                total.merge(&summary);
            }
            info!(%total, "date sweep complete");
        }
        Command::Status => {
            for stat in store.article_stats().await? {
                info!(
                    source = %stat.name,
                    slug = %stat.slug,
                    language = %stat.language,
                    count = stat.count,
                    latest = ?stat.latest_article,
                    "source stats"
                );
            }
        }
    }

    Ok(())
}

/// Join active sources from Postgres with their YAML extraction profile,
/// keeping only those present in both and, if `only_slug` is set, matching
/// it. A source active in the database with no profile entry (or vice
/// versa) is skipped with a warning rather than failing the whole run.
async fn load_source_contexts(
    store: &ArchiveStore,
    documents: &SourcesDocument,
    only_slug: Option<&str>,
) -> Result<Vec<SourceContext>> {
    let sources = store.get_active_sources().await?;
    let mut contexts = Vec::new();

    for source in sources {
        if let Some(slug) = only_slug {
            if source.slug != slug {
                continue;
            }
        }
        match documents.get(&source.slug) {
            Some(profile) => contexts.push(SourceContext {
                source,
                profile: profile.clone(),
            }),
            None => warn!(slug = %source.slug, "active source has no sources.yaml profile, skipping"),
        }
    }

    Ok(contexts)
}
