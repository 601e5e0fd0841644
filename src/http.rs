//! Page fetching abstraction.
//!
//! This module defines the `PageFetcher` trait so the navigator can be driven
//! by a real HTTP client in production and by canned responses in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use url::Url;

use crate::error::{NavError, Result};
use crate::navigator::NavigatorConfig;

/// Response to a page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,
    /// URL the response was finally served from (after redirects)
    pub url: Url,
    /// Response body as a string
    pub body: String,
}

impl PageResponse {
    /// 200 response served from `url`.
    pub fn ok(url: Url, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            url,
            body: body.into(),
        }
    }
}

/// Trait for fetching replacement pages.
///
/// Implementations send a GET with same-origin credentials and the
/// identifying headers from [`NavigatorConfig`]. They report what the server
/// returned; judging the response is left to [`fetch_page`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// # Errors
    /// Returns an error only for transport failures (DNS, connection, timeout).
    async fn fetch(&self, url: &Url) -> Result<PageResponse>;
}

/// Fetch `url` and return its HTML, or the reason the AJAX path must be
/// abandoned.
///
/// A redirect to a different URL, a non-2xx status and an empty body are all
/// failures. Nothing is retried.
pub async fn fetch_page<F: PageFetcher + ?Sized>(fetcher: &F, url: &Url) -> Result<String> {
    let response = fetcher.fetch(url).await?;

    if without_fragment(&response.url) != without_fragment(url) {
        return Err(NavError::Redirected {
            requested: url.clone(),
            landed: response.url,
        });
    }
    if !(200..300).contains(&response.status) {
        return Err(NavError::Status(response.status));
    }
    if response.body.trim().is_empty() {
        return Err(NavError::EmptyBody);
    }

    tracing::debug!(
        url = %url,
        status = response.status,
        response_len = response.body.len(),
        "Page fetched"
    );
    Ok(response.body)
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production page fetcher using reqwest.
///
/// Keeps a cookie store so session and CSRF cookies travel with every
/// request, like `credentials: 'same-origin'` in the browser.
#[derive(Clone)]
pub struct ReqwestPageFetcher {
    client: reqwest::Client,
}

impl ReqwestPageFetcher {
    pub fn new(config: &NavigatorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_str(&config.requested_with)
                .map_err(|e| anyhow::anyhow!("Invalid X-Requested-With header: {}", e))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&config.accept)
                .map_err(|e| anyhow::anyhow!("Invalid Accept header: {}", e))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    #[tracing::instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<PageResponse> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Page request failed");
            e
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await?;

        tracing::info!(
            status = status,
            redirected = final_url != *url,
            response_len = body.len(),
            "Page request completed"
        );

        Ok(PageResponse {
            status,
            url: final_url,
            body,
        })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

/// Mock page fetcher for testing.
///
/// Responses are queued per URL (fragment ignored) and returned in FIFO
/// order.
///
/// # Example
/// ```ignore
/// let mock = MockPageFetcher::new();
/// mock.add_page("http://localhost/venues/42/", "<html>...</html>");
/// ```
#[derive(Clone, Default)]
pub struct MockPageFetcher {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<Url>>>,
    in_flight: Arc<AtomicUsize>,
}

/// A mock response that can optionally wait for a trigger before completing.
enum MockResponse {
    Immediate(Result<PageResponse>),
    Triggered {
        response: Result<PageResponse>,
        trigger: oneshot::Receiver<()>,
    },
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &Url) -> String {
        without_fragment(url).to_string()
    }

    fn parse(url: &str) -> Url {
        Url::parse(url).unwrap_or_else(|e| panic!("invalid mock URL {url}: {e}"))
    }

    /// Queue a response for `url`.
    pub fn add_response(&self, url: &str, response: Result<PageResponse>) {
        self.responses
            .lock()
            .entry(Self::key(&Self::parse(url)))
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Queue a 200 response served from `url` itself.
    pub fn add_page(&self, url: &str, html: &str) {
        self.add_response(url, Ok(PageResponse::ok(Self::parse(url), html)));
    }

    /// Queue a response with an arbitrary status served from `url`.
    pub fn add_status(&self, url: &str, status: u16, html: &str) {
        self.add_response(
            url,
            Ok(PageResponse {
                status,
                url: Self::parse(url),
                body: html.to_string(),
            }),
        );
    }

    /// Queue a response that completes only once the returned sender fires
    /// (or is dropped).
    pub fn add_response_with_trigger(
        &self,
        url: &str,
        response: Result<PageResponse>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(Self::key(&Self::parse(url)))
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: rx,
            });
        tx
    }

    /// URLs fetched so far, in call order.
    pub fn get_calls(&self) -> Vec<Url> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Fetches currently waiting on a trigger or otherwise executing.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<PageResponse> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        self.calls.lock().push(url.clone());

        let mock_response = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(&Self::key(url))
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                // Proceed whether the trigger fired or was dropped
                let _ = trigger.await;
                response
            }
            None => Err(NavError::Other(anyhow::anyhow!(
                "No mock response configured for {}",
                url
            ))),
        }
    }
}

/// Decrements the in-flight counter when dropped, even on cancellation.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_accepts_2xx_html() {
        let mock = MockPageFetcher::new();
        mock.add_page("http://localhost/venues/42/", "<html><body>ok</body></html>");

        let html = fetch_page(&mock, &url("http://localhost/venues/42/"))
            .await
            .unwrap();
        assert!(html.contains("ok"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_non_2xx() {
        let mock = MockPageFetcher::new();
        mock.add_status("http://localhost/missing/", 404, "<html>not found</html>");

        let err = fetch_page(&mock, &url("http://localhost/missing/"))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_redirect() {
        let mock = MockPageFetcher::new();
        mock.add_response(
            "http://localhost/account/",
            Ok(PageResponse::ok(
                url("http://localhost/login/?next=/account/"),
                "<html>login</html>",
            )),
        );

        let err = fetch_page(&mock, &url("http://localhost/account/"))
            .await
            .unwrap_err();
        match err {
            NavError::Redirected { landed, .. } => assert_eq!(landed.path(), "/login/"),
            other => panic!("expected redirect error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_ignores_fragment_when_checking_redirects() {
        let mock = MockPageFetcher::new();
        mock.add_page("http://localhost/venues/", "<html><body>list</body></html>");

        let result = fetch_page(&mock, &url("http://localhost/venues/#top")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_blank_body() {
        let mock = MockPageFetcher::new();
        mock.add_page("http://localhost/blank/", "  \n\t ");

        let err = fetch_page(&mock, &url("http://localhost/blank/"))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::EmptyBody));
    }

    #[tokio::test]
    async fn test_mock_without_response_errors() {
        let mock = MockPageFetcher::new();
        assert!(mock.fetch(&url("http://localhost/nope/")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_with_trigger() {
        let mock = MockPageFetcher::new();
        let trigger = mock.add_response_with_trigger(
            "http://localhost/slow/",
            Ok(PageResponse::ok(url("http://localhost/slow/"), "<p>slow</p>")),
        );

        let mock_clone = mock.clone();
        let handle =
            tokio::spawn(async move { mock_clone.fetch(&url("http://localhost/slow/")).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        assert_eq!(mock.in_flight_count(), 1);

        trigger.send(()).unwrap();
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.body, "<p>slow</p>");
        assert_eq!(mock.in_flight_count(), 0);
    }
}
