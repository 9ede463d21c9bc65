// ABOUTME: Library root for the API diff runner
// ABOUTME: Compares two deployments of a JSON API and classifies every structural difference

pub mod compare;
pub mod config;
pub mod error;
pub mod remote;

pub use compare::{ComparisonRecord, DiffEntry, Engine, JobResult};
pub use config::{Catalog, JobSpec, RunOptions};
pub use error::ComparatorError;
