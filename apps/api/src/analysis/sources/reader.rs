use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use super::{is_fetchable_url, normalize_whitespace, ContentFetcher, FetchResult, FetchStrategy, ReaderSettings};

/// Minimum gap between two requests to the proxy.
const REQUEST_SPACING: Duration = Duration::from_secs(1);

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Fetches pages through a remote reader proxy (`GET {proxy}{url}`), which
/// renders the page server-side and returns its text.
pub struct ReaderProxyFetcher {
    http: reqwest::Client,
    settings: ReaderSettings,
    last_request: Option<Instant>,
}

impl ReaderProxyFetcher {
    pub fn new(http: reqwest::Client, settings: ReaderSettings) -> Self {
        Self {
            http,
            settings,
            last_request: None,
        }
    }

    fn proxied_url(&self, url: &str) -> String {
        format!("{}{}", self.settings.proxy_url, url.trim())
    }

    async fn respect_spacing(&mut self) {
        if let Some(last) = self.last_request {
            let wait = REQUEST_SPACING.saturating_sub(last.elapsed());
            if !wait.is_zero() {
                sleep(wait).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn get(&self, url: &str) -> Result<String, String> {
        let mut request = self
            .http
            .get(self.proxied_url(url))
            .header(USER_AGENT, BROWSER_USER_AGENT);
        if let Some(key) = &self.settings.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                "Request timed out".to_string()
            } else {
                format!("Request failed: {e}")
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP error: {}", status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {e}"))
    }
}

#[async_trait]
impl ContentFetcher for ReaderProxyFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::ReaderProxy
    }

    async fn fetch(&mut self, url: &str) -> FetchResult {
        if !is_fetchable_url(url) {
            return FetchResult::invalid_url(url);
        }
        self.respect_spacing().await;
        info!("Fetching {url} via reader proxy");

        match self.get(url).await {
            Ok(body) => {
                let content = normalize_whitespace(&body);
                info!("Fetched {url} ({} chars)", content.len());
                FetchResult::ok(url, content)
            }
            Err(e) => {
                warn!("Reader proxy fetch failed for {url}: {e}");
                FetchResult::failed(url, e)
            }
        }
    }
}
