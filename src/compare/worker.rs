// ABOUTME: Executes one comparison task: fetch both sides, diff, classify
// ABOUTME: Failures become data on the record; diffing only happens when both sides succeed

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use super::classify::{classify, filter_ignored, DiffEntry};
use super::diff::structural_diff;
use super::expand::ComparisonTask;
use crate::config::Headers;
use crate::remote::{CachedFetcher, FetchResult};

/// Outcome of one (endpoint, substitution, geo) comparison. Immutable once collected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    pub key: String,
    pub params: BTreeMap<String, String>,
    pub geo: Option<String>,
    pub url_a: String,
    pub url_b: String,
    pub status_a: Option<u16>,
    pub status_b: Option<u16>,
    pub response_time_a: u64,
    pub response_time_b: u64,
    pub timestamp_a: String,
    pub timestamp_b: String,
    pub headers_used: Headers,
    pub raw_json_a: Option<Value>,
    pub raw_json_b: Option<Value>,
    pub diffs: Vec<DiffEntry>,
    pub error: Option<String>,
}

impl ComparisonRecord {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn has_diffs(&self) -> bool {
        !self.diffs.is_empty()
    }
}

pub async fn run_task(
    task: ComparisonTask,
    fetcher: &CachedFetcher,
    ignore_paths: &[String],
) -> ComparisonRecord {
    let headers = task.headers();

    let side_a = fetcher.fetch(&task.url_a, &headers).await;
    let timestamp_a = Utc::now().to_rfc3339();
    let side_b = fetcher.fetch(&task.url_b, &headers).await;
    let timestamp_b = Utc::now().to_rfc3339();

    let error = describe_failure(&task, &side_a, &side_b);
    let diffs = match (&error, &side_a.data, &side_b.data) {
        (None, Some(a), Some(b)) => compare_payloads(a, b, ignore_paths),
        _ => Vec::new(),
    };

    if let Some(message) = &error {
        warn!("{}: {}", task.key, message);
    }

    ComparisonRecord {
        key: task.key,
        params: task.params,
        geo: task.geo,
        url_a: task.url_a,
        url_b: task.url_b,
        status_a: side_a.status,
        status_b: side_b.status,
        response_time_a: side_a.elapsed_ms,
        response_time_b: side_b.elapsed_ms,
        timestamp_a,
        timestamp_b,
        headers_used: headers,
        raw_json_a: side_a.data,
        raw_json_b: side_b.data,
        diffs,
        error,
    }
}

/// Structural diff minus ignored paths, every surviving entry classified.
pub fn compare_payloads(a: &Value, b: &Value, ignore_paths: &[String]) -> Vec<DiffEntry> {
    filter_ignored(structural_diff(a, b), ignore_paths)
        .into_iter()
        .map(classify)
        .collect()
}

fn describe_failure(task: &ComparisonTask, a: &FetchResult, b: &FetchResult) -> Option<String> {
    let geo = task.geo.as_deref().unwrap_or("default");
    let side = |name: &str, result: &FetchResult| {
        format!(
            "{} failed (geo={}): {}",
            name,
            geo,
            result.error.as_deref().unwrap_or("unknown error")
        )
    };

    match (a.success, b.success) {
        (true, true) => None,
        (false, true) => Some(side("A", a)),
        (true, false) => Some(side("B", b)),
        (false, false) => Some(format!("{}; {}", side("A", a), side("B", b))),
    }
}
