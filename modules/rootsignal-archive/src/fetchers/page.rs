// Page-rendering backends (§4.6): a local headless-Chromium subprocess and a
// remote Browserless-compatible service. Both produce the same `FetchedPage`
// shape so the scraper and discoverers never need to know which is active.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use rootsignal_common::FetchedPage;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Max concurrent Chromium processes. Each instance is heavy (~100MB+ RSS).
const MAX_CONCURRENT_CHROME: usize = 2;
/// Max retry attempts for transient Chrome failures.
const CHROME_MAX_ATTEMPTS: u32 = 3;
/// Base backoff duration for Chrome retries. Actual delay is base * 3^attempt + jitter.
const CHROME_RETRY_BASE: Duration = Duration::from_secs(3);

/// Local headless-Chromium backend. Always opens a fresh subprocess and
/// profile directory per navigation — there is no persistent context to
/// keep warm the way the remote backend has.
pub(crate) struct ChromeFetcher {
    semaphore: Semaphore,
    proxy_url: Option<String>,
}

impl ChromeFetcher {
    pub(crate) fn new(proxy_url: Option<String>) -> Self {
        info!(
            max_concurrent = MAX_CONCURRENT_CHROME,
            proxy = proxy_url.is_some(),
            "chrome fetcher initialized"
        );
        Self {
            semaphore: Semaphore::new(MAX_CONCURRENT_CHROME),
            proxy_url,
        }
    }

    pub(crate) async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("chrome semaphore closed"))?;

        info!(url, fetcher = "chrome", "fetching page");

        let html_bytes = self.run_chrome(url).await?;

        if html_bytes.is_empty() {
            warn!(url, fetcher = "chrome", "empty DOM output");
            return Ok(FetchedPage {
                url: url.to_string(),
                final_url: url.to_string(),
                raw_html: String::new(),
                status: None,
            });
        }

        let raw_html = String::from_utf8_lossy(&html_bytes).into_owned();
        info!(url, fetcher = "chrome", bytes = raw_html.len(), "fetched successfully");

        Ok(FetchedPage {
            url: url.to_string(),
            // --dump-dom doesn't report the post-redirect URL or status;
            // the browser-control backend is the one source profiles with
            // redirect-heavy sections should prefer.
            final_url: url.to_string(),
            raw_html,
            status: Some(200),
        })
    }

    /// Launch Chrome --dump-dom and return raw stdout bytes.
    async fn run_chrome(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(url).context("invalid url")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("only http/https urls allowed, got: {}", parsed.scheme());
        }

        let chrome_bin = std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string());

        for attempt in 0..CHROME_MAX_ATTEMPTS {
            let tmp_dir = tempfile::tempdir().context("failed to create temp profile dir")?;

            let mut args = vec![
                "--headless".to_string(),
                "--no-sandbox".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                format!("--user-data-dir={}", tmp_dir.path().display()),
            ];
            if let Some(proxy_url) = &self.proxy_url {
                args.push(format!("--proxy-server={proxy_url}"));
            }
            args.push("--dump-dom".to_string());
            args.push(url.to_string());

            let result = tokio::time::timeout(
                Duration::from_secs(30),
                tokio::process::Command::new(&chrome_bin).args(&args).output(),
            )
            .await;

            match result {
                Ok(Ok(output)) => {
                    if output.status.success() {
                        if output.stdout.is_empty() && attempt + 1 < CHROME_MAX_ATTEMPTS {
                            warn!(url, attempt = attempt + 1, "chrome returned empty DOM, retrying");
                            retry_with_backoff(attempt).await;
                            continue;
                        }
                        return Ok(output.stdout);
                    }
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if is_transient_error(&stderr) && attempt + 1 < CHROME_MAX_ATTEMPTS {
                        retry_with_backoff(attempt).await;
                        continue;
                    }
                    warn!(url, fetcher = "chrome", stderr = %stderr, "chrome exited with error");
                    return Ok(Vec::new());
                }
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    if is_transient_error(&msg) && attempt + 1 < CHROME_MAX_ATTEMPTS {
                        warn!(url, attempt = attempt + 1, error = %e, "chrome launch failed, retrying");
                        retry_with_backoff(attempt).await;
                        continue;
                    }
                    anyhow::bail!("failed to run chrome for {url}: {e}");
                }
                Err(_) => {
                    if attempt + 1 < CHROME_MAX_ATTEMPTS {
                        warn!(url, attempt = attempt + 1, "chrome timed out, retrying");
                        retry_with_backoff(attempt).await;
                        continue;
                    }
                    anyhow::bail!("chrome timed out after 30s for {url}");
                }
            }
        }

        Ok(Vec::new())
    }
}

/// Remote browser-control backend (Browserless or compatible), reused across
/// navigations within a source's shared context, or opened fresh per
/// navigation for sources flagged `needs_fresh_context` (§4.6).
pub(crate) struct BrowserlessFetcher {
    client: browserless_client::BrowserlessClient,
}

impl BrowserlessFetcher {
    pub(crate) fn new(base_url: &str, token: Option<&str>, proxy_url: Option<&str>) -> Self {
        info!(base_url, proxy = proxy_url.is_some(), "browserless fetcher initialized");
        let mut client = browserless_client::BrowserlessClient::new(base_url, token);
        if let Some(proxy_url) = proxy_url {
            client = client.with_proxy(proxy_url);
        }
        Self { client }
    }

    pub(crate) fn new_context(&self) -> Result<browserless_client::BrowserContext> {
        self.client.new_context().map_err(Into::into)
    }

    pub(crate) async fn fetch(&self, ctx: &browserless_client::BrowserContext, url: &str) -> Result<FetchedPage> {
        info!(url, fetcher = "browserless", "fetching page");

        let rendered = self
            .client
            .navigate(ctx, url)
            .await
            .context("browserless navigation failed")?;

        info!(
            url,
            fetcher = "browserless",
            bytes = rendered.html.len(),
            status = ?rendered.status,
            "fetched successfully"
        );

        Ok(FetchedPage {
            url: rendered.requested_url,
            final_url: rendered.final_url,
            raw_html: rendered.html,
            status: rendered.status,
        })
    }
}

fn is_transient_error(msg: &str) -> bool {
    msg.contains("Cannot fork") || msg.contains("Resource temporarily unavailable")
}

async fn retry_with_backoff(attempt: u32) {
    let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
    let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
    tokio::time::sleep(backoff + jitter).await;
}
