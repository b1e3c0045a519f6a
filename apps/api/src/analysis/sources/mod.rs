//! Content source resolver: URL → whitespace-normalised page text.
//!
//! Three interchangeable fetchers share one result shape. A fetcher instance
//! is owned by exactly one pipeline branch and processes URLs one at a time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::llm_client::TextGenerator;

pub mod browser;
pub mod model_direct;
pub mod reader;

pub use browser::BrowserFetcher;
pub use model_direct::ModelDirectFetcher;
pub use reader::ReaderProxyFetcher;

/// Outcome of resolving one URL. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub url: String,
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn ok(url: &str, content: String) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            content,
            error: None,
        }
    }

    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }

    pub(crate) fn invalid_url(url: &str) -> Self {
        Self::failed(url, "URL must start with http:// or https://")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStrategy {
    #[default]
    HeadlessBrowser,
    ReaderProxy,
    ModelDirect,
}

impl FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "headless_browser" | "browser" => Ok(FetchStrategy::HeadlessBrowser),
            "reader_proxy" | "reader" => Ok(FetchStrategy::ReaderProxy),
            "model_direct" | "model" => Ok(FetchStrategy::ModelDirect),
            other => Err(format!(
                "Unknown FETCH_STRATEGY '{other}' (expected headless_browser, reader_proxy or model_direct)"
            )),
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchStrategy::HeadlessBrowser => "headless_browser",
            FetchStrategy::ReaderProxy => "reader_proxy",
            FetchStrategy::ModelDirect => "model_direct",
        })
    }
}

#[async_trait]
pub trait ContentFetcher: Send {
    fn strategy(&self) -> FetchStrategy;

    /// Resolves one URL. Failures are reported in the result, never raised.
    async fn fetch(&mut self, url: &str) -> FetchResult;

    /// Resolves URLs strictly one after another, in order.
    async fn fetch_all(&mut self, urls: &[String]) -> Vec<FetchResult> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            results.push(self.fetch(url).await);
        }
        results
    }

    /// Tears down anything the fetcher started. Safe to call more than once.
    async fn close(&mut self) {}
}

/// Builds a fresh fetcher for each pipeline branch.
pub trait FetcherFactory: Send + Sync {
    fn create(&self) -> Box<dyn ContentFetcher>;
}

#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub proxy_url: String,
    pub api_key: Option<String>,
}

/// Factory selected by `FETCH_STRATEGY`.
pub struct DefaultFetcherFactory {
    strategy: FetchStrategy,
    browser_timeout: Duration,
    reader: ReaderSettings,
    generator: Arc<dyn TextGenerator>,
    http: reqwest::Client,
}

impl DefaultFetcherFactory {
    pub fn new(
        strategy: FetchStrategy,
        browser_timeout: Duration,
        reader: ReaderSettings,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            strategy,
            browser_timeout,
            reader,
            generator,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl FetcherFactory for DefaultFetcherFactory {
    fn create(&self) -> Box<dyn ContentFetcher> {
        match self.strategy {
            FetchStrategy::HeadlessBrowser => Box::new(BrowserFetcher::new(self.browser_timeout)),
            FetchStrategy::ReaderProxy => {
                Box::new(ReaderProxyFetcher::new(self.http.clone(), self.reader.clone()))
            }
            FetchStrategy::ModelDirect => Box::new(ModelDirectFetcher::new(Arc::clone(&self.generator))),
        }
    }
}

pub fn is_fetchable_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

/// Collapses runs of spaces and tabs, trims every line and drops blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split([' ', '\t']).filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
