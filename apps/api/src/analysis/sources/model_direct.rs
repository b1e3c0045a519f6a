use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{is_fetchable_url, normalize_whitespace, ContentFetcher, FetchResult, FetchStrategy};
use crate::llm_client::{GenerationRequest, TextGenerator};

const PAGE_READER_SYSTEM: &str = "\
    You read web pages and return their textual content. \
    Return only text that appears on the page; do not summarise, translate or add commentary.";

/// Asks the provider to read the page itself (URL-context tool enabled).
pub struct ModelDirectFetcher {
    generator: Arc<dyn TextGenerator>,
}

impl ModelDirectFetcher {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

fn page_prompt(url: &str) -> String {
    format!(
        "Open the following URL and return the main textual content of the page, \
         including any company, hiring, talent or culture information it contains.\n\nURL: {url}"
    )
}

#[async_trait]
impl ContentFetcher for ModelDirectFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::ModelDirect
    }

    async fn fetch(&mut self, url: &str) -> FetchResult {
        if !is_fetchable_url(url) {
            return FetchResult::invalid_url(url);
        }
        info!("Fetching {url} via provider URL context");

        let prompt = page_prompt(url.trim());
        let request = GenerationRequest::new(PAGE_READER_SYSTEM, &prompt).with_url_context();

        match self.generator.generate(request).await {
            Ok(output) => {
                let content = normalize_whitespace(&output.into_text());
                if content.is_empty() {
                    warn!("Provider returned no text for {url}");
                    return FetchResult::failed(url, "Provider returned no page text");
                }
                info!("Fetched {url} ({} chars)", content.len());
                FetchResult::ok(url, content)
            }
            Err(e) => {
                warn!("Provider fetch failed for {url}: {e}");
                FetchResult::failed(url, e.to_string())
            }
        }
    }
}
