pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

/// Fixed browsing-context fingerprint (§4.5). A single value reused for
/// every context this process opens — sources are not fingerprinted
/// individually, only the remote anti-bot defenses are.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub timezone_id: String,
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            locale: "en-US".to_string(),
            timezone_id: "Asia/Colombo".to_string(),
        }
    }
}

/// An isolated browsing context: its own cookie jar and a fixed
/// fingerprint, opened through the client's proxy (if any). Workers either
/// keep one context alive per source or call [`BrowserlessClient::new_context`]
/// fresh before every navigation, per the source's `needs_fresh_context` flag.
pub struct BrowserContext {
    client: reqwest::Client,
    fingerprint: Fingerprint,
}

/// The outcome of one navigation: the rendered DOM, the URL observed after
/// any redirects, and the HTTP status of the final response.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub requested_url: String,
    pub final_url: String,
    pub html: String,
    pub status: Option<u16>,
}

#[derive(Deserialize)]
struct FunctionResponse {
    data: FunctionData,
}

#[derive(Deserialize)]
struct FunctionData {
    html: String,
    url: String,
    status: Option<u16>,
}

/// Puppeteer-style function body executed remotely by Browserless's
/// `/function` endpoint. Handles DOM-content-loaded wait, a brief settle,
/// and Cloudflare interstitial polling (§4.6 steps 1-2); the caller does
/// selector-driven extraction locally against the returned HTML.
const NAVIGATE_FUNCTION: &str = r#"
module.exports = async ({ page, context }) => {
  await page.setUserAgent(context.userAgent);
  await page.setViewport({ width: context.viewportWidth, height: context.viewportHeight });
  const response = await page.goto(context.url, { waitUntil: 'domcontentloaded', timeout: 30000 });
  await new Promise((r) => setTimeout(r, 2000));

  let title = await page.title();
  if (title.toLowerCase().includes('just a moment')) {
    for (let i = 0; i < 10; i++) {
      await new Promise((r) => setTimeout(r, 1000));
      title = await page.title();
      if (!title.toLowerCase().includes('just a moment')) break;
    }
  }

  const html = await page.content();
  return {
    data: { html, url: page.url(), status: response ? response.status() : null },
    type: 'application/json',
  };
};
"#;

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    proxy_url: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            proxy_url: None,
        }
    }

    /// Route every opened context through this SOCKS5/HTTP proxy.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}{path}", self.base_url);
        if let Some(token) = &self.token {
            url.push_str(if path.contains('?') { "&token=" } else { "?token=" });
            url.push_str(token);
        }
        url
    }

    /// Allocate an isolated browsing context with the fixed fingerprint
    /// (§4.5), opened through the client's proxy if one is configured.
    pub fn new_context(&self) -> Result<BrowserContext> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(35))
            .cookie_store(true);
        if let Some(proxy_url) = &self.proxy_url {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| BrowserlessError::Network(e.to_string()))?,
            );
        }
        let client = builder
            .build()
            .map_err(|e| BrowserlessError::Network(e.to_string()))?;
        Ok(BrowserContext {
            client,
            fingerprint: Fingerprint::default(),
        })
    }

    /// Release a context. A no-op beyond dropping it — the cookie jar and
    /// connection pool live entirely on our side, there is nothing remote
    /// to tear down.
    pub fn close_context(&self, _ctx: BrowserContext) {}

    /// Fetch fully-rendered HTML content for a URL via the Browserless
    /// `/content` endpoint, ignoring context/fingerprint (used for
    /// low-stakes fetches such as feed-discovery probing).
    pub async fn content(&self, url: &str) -> Result<String> {
        let endpoint = self.endpoint("/content");
        let body = json!({ "url": url });

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Navigate a context to `url`, wait out any Cloudflare interstitial,
    /// and return the rendered HTML plus the post-redirect URL (§4.6
    /// steps 1-2). Selector-driven field extraction happens afterward,
    /// locally, against the returned HTML.
    pub async fn navigate(&self, ctx: &BrowserContext, url: &str) -> Result<RenderedPage> {
        let endpoint = self.endpoint("/function");
        let body = json!({
            "code": NAVIGATE_FUNCTION,
            "context": {
                "url": url,
                "userAgent": ctx.fingerprint.user_agent,
                "viewportWidth": ctx.fingerprint.viewport_width,
                "viewportHeight": ctx.fingerprint.viewport_height,
                "locale": ctx.fingerprint.locale,
                "timezoneId": ctx.fingerprint.timezone_id,
            },
        });

        let resp = ctx
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: FunctionResponse = resp
            .json()
            .await
            .map_err(|e| BrowserlessError::Network(e.to_string()))?;

        Ok(RenderedPage {
            requested_url: url.to_string(),
            final_url: parsed.data.url,
            html: parsed.data.html,
            status: parsed.data.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_default_matches_spec_4_5() {
        let fp = Fingerprint::default();
        assert_eq!(fp.viewport_width, 1920);
        assert_eq!(fp.viewport_height, 1080);
        assert_eq!(fp.locale, "en-US");
        assert_eq!(fp.timezone_id, "Asia/Colombo");
        assert!(fp.user_agent.contains("Chrome"));
    }

    #[test]
    fn endpoint_appends_token_with_correct_separator() {
        let client = BrowserlessClient::new("https://browser.example.com", Some("abc123"));
        assert_eq!(
            client.endpoint("/content"),
            "https://browser.example.com/content?token=abc123"
        );
    }

    #[test]
    fn endpoint_without_token_is_unmodified() {
        let client = BrowserlessClient::new("https://browser.example.com/", None);
        assert_eq!(client.endpoint("/content"), "https://browser.example.com/content");
    }

    #[test]
    fn new_context_succeeds_without_proxy() {
        let client = BrowserlessClient::new("https://browser.example.com", None);
        assert!(client.new_context().is_ok());
    }
}
