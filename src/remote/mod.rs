// ABOUTME: HTTP fetch layer for both sides of a comparison
// ABOUTME: Retrying GET client plus the per-job response cache wrapped around it

pub mod cache;
pub mod client;
pub mod models;

pub use cache::{CachedFetcher, ResponseCache};
pub use client::{fetch_with_retry, Fetcher, HttpFetcher, ATTEMPT_TIMEOUT};
pub use models::{FetchResult, RawResponse};
