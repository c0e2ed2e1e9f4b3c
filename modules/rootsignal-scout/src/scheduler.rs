//! The multi-source scheduler (§4.9) — the system's heart. Owns a
//! per-source FIFO queue map, a worker pool that drains it under per-source
//! rate limits and concurrency caps, and an autoscaling supervisor that
//! reacts to queue depth and recent error rate.
//!
//! The scheduler is deliberately ignorant of *what* a worker does with an
//! item — it picks `(source, item)` pairs and hands them to a caller-supplied
//! closure, so this module has no dependency on the browser pool, the
//! extraction routine, or the database. That split keeps the fairness
//! algorithm testable without any I/O.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rootsignal_common::{CandidateItem, RunSummary, ScrapeErrorKind};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::rate_limit::RateLimiter;

/// Hard cap on the worker pool regardless of autoscaling pressure (§4.9).
pub const MAX_WORKERS: usize = 25;
/// Autoscaling supervisor tick interval (§4.9).
const SUPERVISOR_TICK: Duration = Duration::from_secs(3);
/// Error-rate threshold above which the supervisor scales down (§4.9).
const SCALE_DOWN_ERROR_RATE: f64 = 0.30;
/// Sleep when no source is ready but discovery is still in flight (§4.9 step 6).
const DISCOVERY_WAIT: Duration = Duration::from_millis(50);

/// What a worker's processing closure reports back for one item, so the
/// scheduler can update its counters and the run summary without knowing
/// anything about scraping or persistence.
#[derive(Debug, Clone)]
pub enum WorkOutcome {
    Inserted,
    SkippedNoDate,
    SkippedDuplicate,
    Failed(ScrapeErrorKind),
}

pub type WorkFn = Arc<
    dyn Fn(String, CandidateItem) -> Pin<Box<dyn Future<Output = WorkOutcome> + Send>>
        + Send
        + Sync,
>;

struct SourceState {
    rate_limiter: Arc<RateLimiter>,
    concurrency_cap: usize,
    priority: i32,
    queue: VecDeque<CandidateItem>,
    active_count: usize,
    discovery_done: bool,
    items_scraped: u64,
    errors: u64,
}

enum Pick {
    Ready {
        slug: String,
        item: CandidateItem,
        limiter: Arc<RateLimiter>,
    },
    SleepFor(Duration),
    NoMoreWork,
}

/// Pick policy (§4.9): among sources whose queue is non-empty and whose
/// `active_count < concurrency_cap`, select the lowest `(priority,
/// items_scraped)` tuple among those whose rate limiter is ready right now.
/// Held only across this constant-time selection; the caller must drop the
/// returned guard-free result before doing any I/O.
async fn pick_next(sources: &Mutex<HashMap<String, SourceState>>) -> Pick {
    let mut guard = sources.lock().await;

    let candidate_slugs: Vec<String> = guard
        .iter()
        .filter(|(_, s)| !s.queue.is_empty() && s.active_count < s.concurrency_cap)
        .map(|(slug, _)| slug.clone())
        .collect();

    if candidate_slugs.is_empty() {
        let all_done = guard.values().all(|s| s.queue.is_empty() && s.discovery_done);
        return if all_done {
            Pick::NoMoreWork
        } else {
            Pick::SleepFor(DISCOVERY_WAIT)
        };
    }

    let mut ready: Vec<(String, i32, u64, Duration)> = Vec::new();
    for slug in &candidate_slugs {
        let state = &guard[slug];
        let delay = state.rate_limiter.time_until_ready().await;
        ready.push((slug.clone(), state.priority, state.items_scraped, delay));
    }

    let soonest = ready
        .iter()
        .filter(|(_, _, _, d)| *d == Duration::ZERO)
        .min_by_key(|(_, priority, scraped, _)| (*priority, *scraped))
        .map(|(slug, ..)| slug.clone());

    let Some(slug) = soonest else {
        let min_delay = ready.iter().map(|(_, _, _, d)| *d).min().unwrap_or(DISCOVERY_WAIT);
        return Pick::SleepFor(min_delay);
    };

    let state = guard.get_mut(&slug).expect("slug just selected from the map");
    let item = state.queue.pop_front().expect("queue checked non-empty above");
    state.active_count += 1;
    let limiter = state.rate_limiter.clone();

    Pick::Ready { slug, item, limiter }
}

/// The scheduler's shared state and worker pool. Cheap to clone — every
/// clone shares the same source map and worker handles.
#[derive(Clone)]
pub struct Scheduler {
    sources: Arc<Mutex<HashMap<String, SourceState>>>,
    summary: Arc<Mutex<RunSummary>>,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            sources: Arc::new(Mutex::new(HashMap::new())),
            summary: Arc::new(Mutex::new(RunSummary::default())),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn register_source(
        &self,
        slug: impl Into<String>,
        rate_limit_ms: u64,
        concurrency_cap: usize,
        priority: i32,
    ) {
        let mut guard = self.sources.lock().await;
        guard.insert(
            slug.into(),
            SourceState {
                rate_limiter: Arc::new(RateLimiter::new(rate_limit_ms)),
                concurrency_cap,
                priority,
                queue: VecDeque::new(),
                active_count: 0,
                discovery_done: false,
                items_scraped: 0,
                errors: 0,
            },
        );
    }

    pub async fn enqueue(&self, slug: &str, item: CandidateItem) {
        let mut guard = self.sources.lock().await;
        if let Some(state) = guard.get_mut(slug) {
            state.queue.push_back(item);
        }
    }

    pub async fn enqueue_all(&self, slug: &str, items: impl IntoIterator<Item = CandidateItem>) {
        let mut guard = self.sources.lock().await;
        if let Some(state) = guard.get_mut(slug) {
            state.queue.extend(items);
        }
    }

    pub async fn mark_discovery_done(&self, slug: &str) {
        let mut guard = self.sources.lock().await;
        if let Some(state) = guard.get_mut(slug) {
            state.discovery_done = true;
        }
    }

    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Drain every registered source's queue with `initial_concurrency`
    /// workers, autoscaling between 1 and [`MAX_WORKERS`] as queue depth
    /// and error rate dictate, until every source's queue is empty and
    /// every source has been marked `discovery_done`. Returns the
    /// aggregated run summary.
    pub async fn run(&self, initial_concurrency: usize, work_fn: WorkFn) -> RunSummary {
        let mut handles: Vec<WorkerHandle> = Vec::new();

        for _ in 0..initial_concurrency.max(1) {
            handles.push(self.spawn_worker(work_fn.clone()));
        }

        loop {
            tokio::time::sleep(SUPERVISOR_TICK).await;
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            handles.retain(|h| !h.join.is_finished());

            let (queue_depth, done) = {
                let guard = self.sources.lock().await;
                let queue_depth: usize = guard.values().map(|s| s.queue.len()).sum();
                let done = guard.values().all(|s| s.queue.is_empty() && s.discovery_done);
                (queue_depth, done)
            };

            if done && handles.is_empty() {
                break;
            }

            let active = handles.len();
            // Approximate "recent" error rate with a whole-run snapshot: the
            // supervisor only needs to react to sustained pressure, not an
            // exact trailing window.
            let (scraped_tick, errors_tick) = {
                let summary = self.summary.lock().await;
                let scraped = summary.inserted + summary.skipped_no_date + summary.skipped_duplicate;
                let errors: u64 = summary.scrape_errors_by_kind.values().sum();
                (scraped, errors)
            };
            let total_attempts = scraped_tick + errors_tick;
            let error_rate = if total_attempts > 0 {
                errors_tick as f64 / total_attempts as f64
            } else {
                0.0
            };

            if error_rate >= SCALE_DOWN_ERROR_RATE && active > 1 {
                let new_target = (active / 2).max(1);
                let to_cancel = active.saturating_sub(new_target);
                for h in handles.iter().rev().take(to_cancel) {
                    h.exit_flag.store(true, Ordering::SeqCst);
                }
                warn!(active, new_target, error_rate, "scheduler: scaling down on error rate");
            } else if queue_depth > 2 * active && active < MAX_WORKERS {
                let to_spawn = 2.min(MAX_WORKERS - active);
                for _ in 0..to_spawn {
                    handles.push(self.spawn_worker(work_fn.clone()));
                }
                info!(active, queue_depth, spawned = to_spawn, "scheduler: scaling up");
            }
        }

        for h in handles {
            let _ = h.join.await;
        }

        self.summary.lock().await.clone()
    }

    fn spawn_worker(&self, work_fn: WorkFn) -> WorkerHandle {
        let sources = self.sources.clone();
        let summary = self.summary.clone();
        let stop = self.stop.clone();
        let exit_flag = Arc::new(AtomicBool::new(false));

        let worker_exit_flag = exit_flag.clone();
        let join = tokio::spawn(async move {
            worker_loop(sources, summary, stop, worker_exit_flag, work_fn).await;
        });

        WorkerHandle { exit_flag, join }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

struct WorkerHandle {
    exit_flag: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// One worker's loop: pick a ready item, wait on its source's rate limiter
/// (a no-op, since the pick already confirmed readiness), run the
/// caller-supplied work closure, then fold the outcome back into the
/// scheduler's counters. Exits cleanly on the process stop signal or a
/// scale-down exit flag — never mid-scrape, only between items.
async fn worker_loop(
    sources: Arc<Mutex<HashMap<String, SourceState>>>,
    summary: Arc<Mutex<RunSummary>>,
    stop: Arc<AtomicBool>,
    exit_flag: Arc<AtomicBool>,
    work_fn: WorkFn,
) {
    loop {
        if stop.load(Ordering::SeqCst) || exit_flag.load(Ordering::SeqCst) {
            return;
        }

        match pick_next(&sources).await {
            Pick::NoMoreWork => return,
            Pick::SleepFor(d) => {
                tokio::time::sleep(d).await;
                continue;
            }
            Pick::Ready { slug, item, limiter } => {
                limiter.wait().await;
                let outcome = work_fn(slug.clone(), item).await;

                let mut guard = sources.lock().await;
                if let Some(state) = guard.get_mut(&slug) {
                    state.active_count = state.active_count.saturating_sub(1);
                    match &outcome {
                        WorkOutcome::Failed(_) => state.errors += 1,
                        _ => state.items_scraped += 1,
                    }
                }
                drop(guard);

                let mut summary = summary.lock().await;
                match outcome {
                    WorkOutcome::Inserted => summary.inserted += 1,
                    WorkOutcome::SkippedNoDate => summary.skipped_no_date += 1,
                    WorkOutcome::SkippedDuplicate => summary.skipped_duplicate += 1,
                    WorkOutcome::Failed(kind) => summary.record_error(kind),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn noop_work_fn(counter: Arc<AtomicU64>) -> WorkFn {
        Arc::new(move |_slug, _item| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                WorkOutcome::Inserted
            })
        })
    }

    #[tokio::test]
    async fn drains_a_single_source_fifo() {
        let scheduler = Scheduler::new();
        scheduler.register_source("a", 0, 2, 10).await;
        for i in 0..5 {
            scheduler.enqueue("a", CandidateItem::new(format!("t{i}"), format!("https://e/{i}"))).await;
        }
        scheduler.mark_discovery_done("a").await;

        let counter = Arc::new(AtomicU64::new(0));
        let summary = scheduler.run(2, noop_work_fn(counter.clone())).await;

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(summary.inserted, 5);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_cap() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new();
        scheduler.register_source("a", 0, 2, 10).await;
        for i in 0..20 {
            scheduler.enqueue("a", CandidateItem::new(format!("t{i}"), format!("https://e/{i}"))).await;
        }
        scheduler.mark_discovery_done("a").await;

        let active_c = active.clone();
        let max_seen_c = max_seen.clone();
        let work_fn: WorkFn = Arc::new(move |_slug, _item| {
            let active = active_c.clone();
            let max_seen = max_seen_c.clone();
            Box::pin(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                WorkOutcome::Inserted
            })
        });

        scheduler.run(4, work_fn).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn lower_priority_value_is_served_first_on_ties() {
        let scheduler = Scheduler::new();
        scheduler.register_source("low-pri", 0, 1, 20).await;
        scheduler.register_source("high-pri", 0, 1, 10).await;
        scheduler
            .enqueue("low-pri", CandidateItem::new("t", "https://low/1"))
            .await;
        scheduler
            .enqueue("high-pri", CandidateItem::new("t", "https://high/1"))
            .await;
        scheduler.mark_discovery_done("low-pri").await;
        scheduler.mark_discovery_done("high-pri").await;

        let order = Arc::new(Mutex::new(Vec::new()));
        let order_c = order.clone();
        let work_fn: WorkFn = Arc::new(move |slug, _item| {
            let order = order_c.clone();
            Box::pin(async move {
                order.lock().await.push(slug);
                WorkOutcome::Inserted
            })
        });

        scheduler.run(1, work_fn).await;
        assert_eq!(order.lock().await.first().map(String::as_str), Some("high-pri"));
    }
}
