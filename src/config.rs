// ABOUTME: Job, endpoint, header and ID catalogs plus run-wide options
// ABOUTME: Catalogs are deserialized from TOML; overrides come from the environment

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::error::ComparatorError;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
pub const DEFAULT_GEO_HEADER: &str = "cb-loc";

/// Headers actually sent with a request, kept sorted so they serialize canonically.
pub type Headers = BTreeMap<String, String>;

/// Header templates keyed by platform identifier.
pub type HeaderTemplates = BTreeMap<String, HeaderTemplate>;

/// ID lists keyed by category name (e.g. "teamId").
pub type IdCatalog = BTreeMap<String, Vec<IdValue>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPair {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub platform: String,
    pub base_a: String,
    pub base_b: String,
    #[serde(default)]
    pub endpoints_to_run: Vec<String>,
    #[serde(default)]
    pub endpoint_pairs: Vec<EndpointPair>,
    /// Per-endpoint ID category overrides, keyed by endpoint key.
    #[serde(default)]
    pub id_categories: BTreeMap<String, String>,
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub ignore_paths: Vec<String>,
    #[serde(default)]
    pub quick_mode: bool,
    pub test_engineer: Option<String>,
}

impl JobSpec {
    /// Rejects specs that would otherwise force the engine to guess.
    pub fn validate(&self) -> Result<&RetryPolicy, ComparatorError> {
        if self.name.trim().is_empty() {
            return Err(ComparatorError::config("job name is empty"));
        }
        for (field, value) in [
            ("platform", &self.platform),
            ("base_a", &self.base_a),
            ("base_b", &self.base_b),
        ] {
            if value.trim().is_empty() {
                return Err(ComparatorError::config(format!(
                    "job '{}' is missing required field '{}'",
                    self.name, field
                )));
            }
        }
        self.retry_policy.as_ref().ok_or_else(|| {
            ComparatorError::config(format!("job '{}' has no retry_policy", self.name))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDef {
    pub platform: String,
    pub key: String,
    pub path: String,
    pub id_category: Option<String>,
}

/// Finds the endpoint with `key` declared for `platform`.
pub fn find_endpoint<'a>(
    endpoints: &'a [EndpointDef],
    platform: &str,
    key: &str,
) -> Option<&'a EndpointDef> {
    endpoints
        .iter()
        .find(|e| e.platform == platform && e.key == key)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderTemplate {
    #[serde(default = "default_geo_header")]
    pub geo_header: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, HeaderValue>,
}

fn default_geo_header() -> String {
    DEFAULT_GEO_HEADER.to_string()
}

impl HeaderTemplate {
    /// Geo variants to fan out over. A scalar geo value (or none at all) yields a single variant.
    pub fn geo_variants(&self) -> Vec<Option<String>> {
        match self.values.get(&self.geo_header) {
            Some(HeaderValue::Many(list)) => list.iter().cloned().map(Some).collect(),
            Some(HeaderValue::One(value)) => vec![Some(value.clone())],
            None => vec![None],
        }
    }

    /// Concrete headers for one geo variant.
    pub fn headers_for(&self, geo: Option<&str>) -> Headers {
        let mut headers: Headers = self
            .values
            .iter()
            .filter(|(name, _)| **name != self.geo_header)
            .map(|(name, value)| {
                let value = match value {
                    HeaderValue::One(v) => v.clone(),
                    HeaderValue::Many(vs) => vs.join(", "),
                };
                (name.clone(), value)
            })
            .collect();
        if let Some(geo) = geo {
            headers.insert(self.geo_header.clone(), geo.to_string());
        }
        headers
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdValue::Int(v) => write!(f, "{}", v),
            IdValue::Text(v) => f.write_str(v),
        }
    }
}

/// Everything a comparison run consumes, as loaded from one TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
    #[serde(default)]
    pub headers: HeaderTemplates,
    #[serde(default)]
    pub ids: IdCatalog,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ComparatorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ComparatorError::Io(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ComparatorError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Run-wide knobs that are not part of any single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub concurrency_limit: usize,
    pub quick_mode: bool,
    /// Staging hosts commonly present self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            quick_mode: false,
            accept_invalid_certs: true,
        }
    }
}

impl RunOptions {
    /// Reads `CONCURRENCY_LIMIT` and `QUICK_MODE` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(raw) = lookup("CONCURRENCY_LIMIT") {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => options.concurrency_limit = limit,
                _ => warn!(
                    "Ignoring CONCURRENCY_LIMIT={:?}; expected a positive integer",
                    raw
                ),
            }
        }

        if let Some(raw) = lookup("QUICK_MODE") {
            options.quick_mode = raw.trim() == "true";
        }

        options
    }
}
