// ABOUTME: Comparison engine: task expansion, fetch-and-diff workers and job aggregation
// ABOUTME: Data flows expand -> scheduler -> worker (fetch, diff, classify) -> job summary

pub mod classify;
pub mod diff;
pub mod expand;
pub mod job;
pub mod scheduler;
pub mod template;
pub mod worker;

pub use classify::{classify, filter_ignored, ChangeType, Classification, DiffEntry, Severity};
pub use diff::{structural_diff, ArrayItemChange, DiffKind, PathSegment, RawDiff};
pub use expand::{expand_job, ComparisonTask, Expansion};
pub use job::{Engine, JobMeta, JobProgress, JobResult, JobSummary};
pub use scheduler::Scheduler;
pub use template::{build_url, PathTemplate};
pub use worker::{run_task, ComparisonRecord};
