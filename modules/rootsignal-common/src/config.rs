use std::env;

/// Process-level configuration loaded once from the environment at startup
/// into an immutable value. Per-source extraction/scheduling profiles are a
/// separate concern (see [`crate::source::SourceProfile`]) loaded from YAML.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string for the persistence adapter.
    pub database_url: String,

    /// Remote headless-browser control endpoint (Browserless or compatible).
    /// Authentication, if any, is encoded in the URL itself.
    pub browser_endpoint: Option<String>,

    /// Optional SOCKS5 proxy URL. When set every browsing context is opened
    /// through it.
    pub proxy_url: Option<String>,

    /// Default per-source minimum interval between scrapes, used when a
    /// source's YAML profile doesn't override `scheduling.rate_limit_ms`.
    pub default_rate_limit_ms: u64,

    /// Worker pool size the scheduler starts with.
    pub initial_concurrency: usize,

    /// Hard cap on the worker pool regardless of autoscaling pressure.
    pub max_workers: usize,

    /// Path to the per-source YAML configuration document.
    pub sources_config_path: String,

    /// Feed items whose declared publication year falls below this are
    /// dropped by the feed discoverer before they ever reach dedup.
    pub feed_min_year: i32,
}

impl Config {
    /// Load configuration from environment variables. Panics with a clear
    /// diagnostic if a mandatory variable is missing; optional variables
    /// fall back to documented defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            browser_endpoint: env::var("BROWSER_ENDPOINT").ok(),
            proxy_url: env::var("PROXY_URL").ok(),
            default_rate_limit_ms: env::var("DEFAULT_RATE_LIMIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2_000),
            initial_concurrency: env::var("INITIAL_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            max_workers: env::var("MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            sources_config_path: env::var("SOURCES_CONFIG_PATH")
                .unwrap_or_else(|_| "sources.yaml".to_string()),
            feed_min_year: env::var("FEED_MIN_YEAR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2020),
        }
    }

    /// Log the first few characters of sensitive values for debugging
    /// without leaking secrets into process logs.
    pub fn log_redacted(&self) {
        let redact = |v: &str| {
            if v.is_empty() {
                "(empty)".to_string()
            } else {
                format!("({} chars)", v.len())
            }
        };
        tracing::info!(database_url = %redact(&self.database_url), "config loaded");
        tracing::info!(
            browser_endpoint = %redact(self.browser_endpoint.as_deref().unwrap_or_default()),
            proxy = self.proxy_url.is_some(),
            initial_concurrency = self.initial_concurrency,
            max_workers = self.max_workers,
            "config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
