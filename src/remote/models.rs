// ABOUTME: Data structures produced by the HTTP fetch layer
// ABOUTME: A FetchResult is owned by the worker that requested it

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw HTTP exchange, before success/failure is decided.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    pub data: Option<Value>,
    pub status: Option<u16>, // None when no connection was ever made
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl FetchResult {
    pub fn ok(data: Value, status: u16, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            status: Some(status),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(status: Option<u16>, error: String, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            status,
            error: Some(error),
            elapsed_ms,
        }
    }
}

pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}
