// ABOUTME: Per-job memoization of identical GET requests
// ABOUTME: Assumes idempotent GETs: the same URL and headers return the same data within a run

//! Each job owns exactly one [`CachedFetcher`]; it is dropped when the job
//! finishes, so entries never outlive the run or leak into another job.
//!
//! Correctness precondition: a GET with identical URL and headers is assumed
//! to return identical data for the duration of a job. Two workers missing
//! the same key at the same moment may both hit the network; whichever
//! result lands first is kept and the other is discarded. That race is
//! accepted rather than serialized behind a lock.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::client::{fetch_with_retry, Fetcher};
use super::models::FetchResult;
use crate::config::{Headers, RetryPolicy};

#[derive(Debug, Clone)]
struct CachedResponse {
    data: Value,
    status: u16,
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL joined with the canonical (sorted-key) JSON form of the headers.
    pub fn key(url: &str, headers: &Headers) -> String {
        let serialized = serde_json::to_string(headers).unwrap_or_default();
        format!("{}|{}", url, serialized)
    }

    /// Hits come back as successes with zero elapsed time.
    pub fn get(&self, key: &str) -> Option<FetchResult> {
        self.entries
            .get(key)
            .map(|entry| FetchResult::ok(entry.data.clone(), entry.status, 0))
    }

    /// Stores a successful result unless the key is already present. Failures are never cached.
    pub fn store(&self, key: String, result: &FetchResult) {
        if !result.success {
            return;
        }
        let (Some(data), Some(status)) = (result.data.as_ref(), result.status) else {
            return;
        };
        self.entries.entry(key).or_insert_with(|| CachedResponse {
            data: data.clone(),
            status,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The retrying fetch layer with a job-scoped cache in front of it.
pub struct CachedFetcher {
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
    cache: ResponseCache,
}

impl CachedFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            retry,
            cache: ResponseCache::new(),
        }
    }

    pub async fn fetch(&self, url: &str, headers: &Headers) -> FetchResult {
        let key = ResponseCache::key(url, headers);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Cache hit for {}", url);
            return hit;
        }

        let result = fetch_with_retry(self.fetcher.as_ref(), url, headers, &self.retry).await;
        self.cache.store(key, &result);
        result
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}
