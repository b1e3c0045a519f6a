use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::{is_fetchable_url, normalize_whitespace, ContentFetcher, FetchResult, FetchStrategy};

/// Time given to client-side rendering after the load event.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Removes non-content nodes, then yields the visible body text.
const EXTRACT_TEXT_SCRIPT: &str = r#"
['script', 'style', 'noscript', 'iframe', 'nav', 'footer', 'header',
 '[role="navigation"]', '[role="banner"]', '.cookie-banner', '.popup', '.modal']
  .forEach(sel => document.querySelectorAll(sel).forEach(el => el.remove()));
document.body ? (document.body.innerText || '') : '';
"#;

struct LaunchedBrowser {
    browser: Browser,
    events: JoinHandle<()>,
}

/// Headless Chromium fetcher. The browser is launched on the first fetch,
/// reused for every later fetch and shut down by `close()`.
pub struct BrowserFetcher {
    timeout: Duration,
    launched: Option<LaunchedBrowser>,
}

impl BrowserFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            launched: None,
        }
    }

    async fn browser(&mut self) -> Result<&Browser, String> {
        if self.launched.is_none() {
            let config = BrowserConfig::builder()
                .request_timeout(self.timeout)
                .build()
                .map_err(|e| format!("Invalid browser configuration: {e}"))?;
            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| format!("Failed to launch headless browser: {e}"))?;

            let events = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            info!("Headless browser launched");
            self.launched = Some(LaunchedBrowser { browser, events });
        }

        self.launched
            .as_ref()
            .map(|l| &l.browser)
            .ok_or_else(|| "Headless browser unavailable".to_string())
    }

    async fn render(&mut self, url: &str) -> Result<String, String> {
        let nav_timeout = self.timeout;
        let browser = self.browser().await?;

        let page = timeout(nav_timeout, browser.new_page("about:blank"))
            .await
            .map_err(|_| format!("Opening a page timed out after {}s", nav_timeout.as_secs()))?
            .map_err(|e| format!("Failed to open page: {e}"))?;

        let text = match navigation_outcome(timeout(nav_timeout, page.goto(url)).await, nav_timeout) {
            Ok(()) => {
                sleep(SETTLE_DELAY).await;
                page.evaluate_expression(EXTRACT_TEXT_SCRIPT)
                    .await
                    .map_err(|e| format!("Text extraction failed: {e}"))
                    .and_then(|result| {
                        result
                            .into_value::<String>()
                            .map_err(|e| format!("Unexpected extraction result: {e}"))
                    })
            }
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            debug!("Failed to close page for {url}: {e}");
        }
        text
    }
}

/// Flattens a bounded navigation into the fetch error message.
fn navigation_outcome<T, E: Display>(
    result: Result<Result<T, E>, Elapsed>,
    limit: Duration,
) -> Result<(), String> {
    match result {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(format!("Navigation failed: {e}")),
        Err(_) => Err(format!("Navigation timed out after {}s", limit.as_secs())),
    }
}

#[async_trait]
impl ContentFetcher for BrowserFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::HeadlessBrowser
    }

    async fn fetch(&mut self, url: &str) -> FetchResult {
        if !is_fetchable_url(url) {
            return FetchResult::invalid_url(url);
        }
        info!("Rendering {url}");

        match self.render(url).await {
            Ok(text) => {
                let content = normalize_whitespace(&text);
                info!("Rendered {url} ({} chars)", content.len());
                FetchResult::ok(url, content)
            }
            Err(e) => {
                warn!("Browser fetch failed for {url}: {e}");
                FetchResult::failed(url, e)
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut launched) = self.launched.take() {
            if let Err(e) = launched.browser.close().await {
                warn!("Failed to close headless browser: {e}");
            }
            if let Err(e) = launched.browser.wait().await {
                warn!("Headless browser did not exit cleanly: {e}");
            }
            launched.events.abort();
            info!("Headless browser closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_launching() {
        let mut fetcher = BrowserFetcher::new(Duration::from_secs(5));
        let result = fetcher.fetch("javascript:alert(1)").await;
        assert!(!result.success);
        assert!(fetcher.launched.is_none());
        fetcher.close().await;
    }

    #[tokio::test]
    async fn test_navigation_outcome_messages() {
        let limit = Duration::from_secs(7);
        assert_eq!(navigation_outcome::<_, String>(Ok(Ok(())), limit), Ok(()));
        assert_eq!(
            navigation_outcome::<(), _>(Ok(Err("net::ERR_NAME_NOT_RESOLVED")), limit),
            Err("Navigation failed: net::ERR_NAME_NOT_RESOLVED".to_string())
        );

        let elapsed = timeout(Duration::ZERO, std::future::pending::<Result<(), String>>()).await;
        assert_eq!(
            navigation_outcome(elapsed, limit),
            Err("Navigation timed out after 7s".to_string())
        );
    }

    #[test]
    fn test_extraction_script_strips_overlays() {
        for selector in ["nav", "footer", "[role=\"banner\"]", ".cookie-banner", ".modal"] {
            assert!(EXTRACT_TEXT_SCRIPT.contains(selector), "missing {selector}");
        }
    }
}
