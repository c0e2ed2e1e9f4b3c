//! Unified page-fetching facade (§4.6) over the two interchangeable
//! backends in `fetchers::page`. Discoverers and the scraper depend only on
//! [`PageBackend`]/[`FetchContext`], never on which backend is configured.

use rootsignal_common::FetchedPage;

use crate::error::Result;
use crate::fetchers::page::{BrowserlessFetcher, ChromeFetcher};

/// A source-scoped browsing context, opened once and reused for every
/// navigation unless the source's profile sets `needs_fresh_context`, in
/// which case the caller opens one per navigation instead. The local
/// Chromium backend has no persistent context of its own — every
/// navigation is its own subprocess — so it carries `None`.
pub enum FetchContext {
    None,
    Browserless(browserless_client::BrowserContext),
}

pub enum PageBackend {
    Chrome(ChromeFetcher),
    Browserless(BrowserlessFetcher),
}

impl PageBackend {
    pub fn chrome(proxy_url: Option<&str>) -> Self {
        PageBackend::Chrome(ChromeFetcher::new(proxy_url.map(String::from)))
    }

    pub fn browserless(base_url: &str, token: Option<&str>, proxy_url: Option<&str>) -> Self {
        PageBackend::Browserless(BrowserlessFetcher::new(base_url, token, proxy_url))
    }

    pub fn new_context(&self) -> Result<FetchContext> {
        match self {
            PageBackend::Chrome(_) => Ok(FetchContext::None),
            PageBackend::Browserless(b) => Ok(FetchContext::Browserless(b.new_context()?)),
        }
    }

    pub async fn fetch(&self, ctx: &FetchContext, url: &str) -> Result<FetchedPage> {
        match (self, ctx) {
            (PageBackend::Chrome(c), _) => c.fetch(url).await.map_err(Into::into),
            (PageBackend::Browserless(b), FetchContext::Browserless(bc)) => {
                b.fetch(bc, url).await.map_err(Into::into)
            }
            (PageBackend::Browserless(_), FetchContext::None) => {
                Err(crate::error::ArchiveError::Other(anyhow::anyhow!(
                    "browserless backend requires a browserless context"
                )))
            }
        }
    }
}
