// ABOUTME: HTTP client used to GET both sides of a comparison
// ABOUTME: Handles fixed-delay retries, per-attempt timeouts and relaxed TLS for staging hosts

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use super::models::{is_success_status, FetchResult, RawResponse};
use crate::config::{Headers, RetryPolicy};

/// Each attempt gets the same budget no matter how many retries remain.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// A single GET round-trip. Implementations must be safe to call concurrently.
pub trait Fetcher: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<RawResponse>>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Certificate checks are relaxed only on this client, never process-wide.
    pub fn new(accept_invalid_certs: bool) -> Result<Self> {
        Self::with_timeout(accept_invalid_certs, ATTEMPT_TIMEOUT)
    }

    pub fn with_timeout(accept_invalid_certs: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<RawResponse>> {
        async move {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("GET {} failed", url))?;

            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body from {}", url))?;

            Ok(RawResponse {
                status,
                body: parse_body(text),
            })
        }
        .boxed()
    }
}

/// Bodies that are not JSON are kept as a string so they still diff and render.
fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}

/// GETs `url`, retrying non-2xx statuses and transport errors with a fixed delay.
///
/// At most `policy.retries + 1` attempts are made. The returned failure carries the
/// last observed status, or `None` if no attempt ever got a response.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    headers: &Headers,
    policy: &RetryPolicy,
) -> FetchResult {
    let started = Instant::now();
    let mut attempt: u32 = 0;
    let mut last_status: Option<u16> = None;

    loop {
        let error = match fetcher.get(url, headers).await {
            Ok(response) if is_success_status(response.status) => {
                return FetchResult::ok(response.body, response.status, elapsed_ms(started));
            }
            Ok(response) => {
                last_status = Some(response.status);
                format!("Status {}", response.status)
            }
            Err(err) => format!("{:#}", err),
        };

        if attempt >= policy.retries {
            return FetchResult::failed(
                last_status,
                format!("{} (after {} attempts)", error, attempt + 1),
                elapsed_ms(started),
            );
        }

        attempt += 1;
        debug!(
            "GET {} failed ({}); retry {}/{} in {}ms",
            url, error, attempt, policy.retries, policy.delay_ms
        );
        tokio::time::sleep(Duration::from_millis(policy.delay_ms)).await;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
