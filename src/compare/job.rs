// ABOUTME: Runs whole jobs and aggregates their records into one summary per job
// ABOUTME: Each job gets its own bounded pool and its own response cache

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::expand::expand_job;
use super::scheduler::Scheduler;
use super::worker::{run_task, ComparisonRecord};
use crate::config::{EndpointDef, HeaderTemplates, IdCatalog, JobSpec, RunOptions};
use crate::error::ComparatorError;
use crate::remote::{CachedFetcher, Fetcher, HttpFetcher};

/// Called as `(job name, completed, total)` after each task of a job finishes.
pub type JobProgress = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub total_comparisons: usize,
    pub failures: usize,
    pub endpoints_with_diffs: usize,
    pub total_diffs: usize,
    pub successful: usize,
}

/// Distinct values seen across a job's records, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMeta {
    pub endpoints_run: Vec<String>,
    pub ids_used: Vec<String>,
    pub geo_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_name: String,
    pub platform: String,
    pub timestamp: String,
    pub test_engineer: Option<String>,
    pub total_tasks: usize,
    /// Endpoint selectors or pairs dropped because they did not resolve.
    pub unresolved: Vec<String>,
    pub summary: JobSummary,
    pub meta: JobMeta,
    pub records: Vec<ComparisonRecord>,
}

impl JobResult {
    /// Aggregation only uses counts and distinct sets, so record order does not matter.
    pub fn aggregate(
        job: &JobSpec,
        total_tasks: usize,
        unresolved: Vec<String>,
        records: Vec<ComparisonRecord>,
    ) -> Self {
        if records.len() != total_tasks {
            warn!(
                "Job '{}': {} of {} comparisons produced no record",
                job.name,
                total_tasks.saturating_sub(records.len()),
                total_tasks
            );
        }

        let failures = records.iter().filter(|r| r.is_failure()).count();
        let summary = JobSummary {
            total_comparisons: records.len(),
            failures,
            endpoints_with_diffs: records.iter().filter(|r| r.has_diffs()).count(),
            total_diffs: records.iter().map(|r| r.diffs.len()).sum(),
            successful: records.len() - failures,
        };

        let endpoints_run: BTreeSet<&str> = records.iter().map(|r| r.key.as_str()).collect();
        let ids_used: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.params.values().map(String::as_str))
            .collect();
        let geo_used: BTreeSet<&str> = records.iter().filter_map(|r| r.geo.as_deref()).collect();
        let meta = JobMeta {
            endpoints_run: endpoints_run.into_iter().map(str::to_string).collect(),
            ids_used: ids_used.into_iter().map(str::to_string).collect(),
            geo_used: geo_used.into_iter().map(str::to_string).collect(),
        };

        Self {
            job_name: job.name.clone(),
            platform: job.platform.clone(),
            timestamp: Utc::now().to_rfc3339(),
            test_engineer: job.test_engineer.clone(),
            total_tasks,
            unresolved,
            summary,
            meta,
            records,
        }
    }

    /// Tasks that never produced a record, e.g. because they panicked.
    pub fn missing_records(&self) -> usize {
        self.total_tasks.saturating_sub(self.records.len())
    }
}

/// Entry point for running comparison jobs against a shared fetcher.
pub struct Engine {
    fetcher: Arc<dyn Fetcher>,
    options: RunOptions,
    progress: Option<JobProgress>,
}

impl Engine {
    /// Uses the real HTTP client configured from `options`.
    pub fn new(options: RunOptions) -> Result<Self, ComparatorError> {
        let fetcher = HttpFetcher::new(options.accept_invalid_certs)
            .map_err(|e| ComparatorError::Fetch(format!("{:#}", e)))?;
        Ok(Self::with_fetcher(Arc::new(fetcher), options))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>, options: RunOptions) -> Self {
        Self {
            fetcher,
            options,
            progress: None,
        }
    }

    pub fn on_progress(mut self, progress: JobProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Runs every task of `job` and aggregates the records.
    ///
    /// Task failures are recorded on their records. Only configuration problems
    /// produce an `Err`, and they do so before any request is made.
    pub async fn run_job(
        &self,
        job: &JobSpec,
        headers: &HeaderTemplates,
        ids: &IdCatalog,
        endpoints: &[EndpointDef],
    ) -> Result<JobResult, ComparatorError> {
        let retry = job.validate()?.clone();
        let template = headers.get(&job.platform).cloned().ok_or_else(|| {
            ComparatorError::config(format!(
                "job '{}': no header template for platform '{}'",
                job.name, job.platform
            ))
        })?;

        let quick = job.quick_mode || self.options.quick_mode;
        let expansion = expand_job(job, Arc::new(template), ids, endpoints, quick);
        let total_tasks = expansion.tasks.len();
        info!(
            "Job '{}': {} comparisons (quick={}, concurrency={})",
            job.name, total_tasks, quick, self.options.concurrency_limit
        );

        let fetcher = Arc::new(CachedFetcher::new(Arc::clone(&self.fetcher), retry));
        let ignore_paths: Arc<[String]> = job.ignore_paths.clone().into();

        let report = |completed: usize, total: usize| {
            if let Some(progress) = &self.progress {
                progress(&job.name, completed, total);
            }
        };

        let records = Scheduler::new(self.options.concurrency_limit)
            .run(
                expansion.tasks,
                |task| {
                    let fetcher = Arc::clone(&fetcher);
                    let ignore_paths = Arc::clone(&ignore_paths);
                    async move { run_task(task, &fetcher, &ignore_paths).await }
                },
                Some(&report),
            )
            .await;

        let result = JobResult::aggregate(job, total_tasks, expansion.unresolved, records);
        info!(
            "Job '{}' finished: {} comparisons, {} failures, {} with diffs, {} diffs",
            result.job_name,
            result.summary.total_comparisons,
            result.summary.failures,
            result.summary.endpoints_with_diffs,
            result.summary.total_diffs
        );
        Ok(result)
    }

    /// Runs all jobs concurrently. Results line up with `jobs`; one job's
    /// configuration error does not affect the others.
    pub async fn run_all_jobs(
        &self,
        jobs: &[JobSpec],
        headers: &HeaderTemplates,
        ids: &IdCatalog,
        endpoints: &[EndpointDef],
    ) -> Vec<Result<JobResult, ComparatorError>> {
        join_all(
            jobs.iter()
                .map(|job| self.run_job(job, headers, ids, endpoints)),
        )
        .await
    }
}
