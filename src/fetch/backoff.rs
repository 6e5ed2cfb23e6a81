//! HTTP transport with retry-on-transient-failure semantics
//!
//! Wraps a `reqwest::Client` and a [`RateLimiter`]. Transient upstream
//! failures (network errors, 429 and the retryable 5xx family) are retried
//! with exponential backoff and never surface to callers; every other
//! response is returned immediately for the caller to interpret.

use crate::error::Result;
use crate::fetch::RateLimiter;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Statuses that indicate a transient upstream condition
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Default initial backoff in seconds
const DEFAULT_INITIAL_BACKOFF: f64 = 1.0;

/// Backoff ceiling in seconds
const DEFAULT_MAX_BACKOFF: f64 = 16.0;

/// Double the current backoff, capped
pub fn next_backoff(current: f64, max: f64) -> f64 {
    (current * 2.0).min(max)
}

/// Extract a numeric Retry-After value in seconds, if the server sent one
pub fn retry_after_secs(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| *s >= 0.0)
}

/// Rate-limited HTTP client with exponential backoff
pub struct BackoffClient {
    client: Client,
    limiter: RateLimiter,
    initial_backoff: f64,
    max_backoff: f64,
}

impl BackoffClient {
    pub fn new(client: Client, limiter: RateLimiter) -> Self {
        Self {
            client,
            limiter,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    /// Override backoff timing (used by tests to avoid real sleeps)
    pub fn with_backoff(mut self, initial_secs: f64, max_secs: f64) -> Self {
        self.initial_backoff = initial_secs;
        self.max_backoff = max_secs;
        self
    }

    /// GET with optional extra headers and query parameters
    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        query: &[(&str, String)],
    ) -> Result<Response> {
        self.execute(|| {
            self.client
                .get(url)
                .headers(headers.clone())
                .query(query)
        })
        .await
    }

    /// POST with a JSON body
    pub async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &serde_json::Value,
    ) -> Result<Response> {
        self.execute(|| self.client.post(url).headers(headers.clone()).json(body))
            .await
    }

    /// Retry loop shared by all request shapes
    ///
    /// The backoff resets for each logical request; retries are unbounded
    /// for long-running unattended fetches.
    async fn execute<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut backoff = self.initial_backoff;

        loop {
            self.limiter.wait().await;

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Transport error, retrying in {:.1}s: {}", backoff, e);
                    tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                    backoff = next_backoff(backoff, self.max_backoff);
                    continue;
                }
            };

            let status = response.status().as_u16();
            if RETRYABLE_STATUSES.contains(&status) {
                let delay = retry_after_secs(response.headers())
                    .map(|ra| ra.max(backoff))
                    .unwrap_or(backoff);
                debug!("HTTP {} from upstream, retrying in {:.1}s", status, delay);
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                backoff = next_backoff(backoff, self.max_backoff);
                continue;
            }

            return Ok(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(limiter_rate: f64) -> BackoffClient {
        BackoffClient::new(Client::new(), RateLimiter::new(limiter_rate))
            .with_backoff(0.01, 0.04)
    }

    #[test]
    fn test_next_backoff_monotonic_and_capped() {
        let mut backoff = 1.0;
        let mut previous = 0.0;
        for _ in 0..10 {
            assert!(backoff >= previous);
            assert!(backoff <= 16.0);
            previous = backoff;
            backoff = next_backoff(backoff, 16.0);
        }
        assert_eq!(backoff, 16.0);
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), Some(7.0));

        // HTTP-date form is ignored, only numeric values are honored
        headers.insert(
            RETRY_AFTER,
            "Fri, 31 Dec 1999 23:59:59 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after_secs(&headers), None);

        assert_eq!(retry_after_secs(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_retries_transient_statuses_until_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(6000.0);
        let url = format!("{}/jobs", server.uri());
        let response = client.get(&url, HeaderMap::new(), &[]).await.unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_non_retryable_status_returned_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(6000.0);
        let url = format!("{}/gone", server.uri());
        let response = client.get(&url, HeaderMap::new(), &[]).await.unwrap();

        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_not_modified_returned_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(6000.0);
        let url = format!("{}/jobs", server.uri());
        let response = client.get(&url, HeaderMap::new(), &[]).await.unwrap();

        assert_eq!(response.status().as_u16(), 304);
    }
}
