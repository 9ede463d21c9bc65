// ABOUTME: Bounded-parallelism task runner for one job
// ABOUTME: At most N tasks run at once; every task is awaited and each completion is reported

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::config::DEFAULT_CONCURRENCY_LIMIT;

/// Invoked after each task finishes with `(completed, total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    limit: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY_LIMIT)
    }
}

impl Scheduler {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Spawns one tokio task per item and returns once all of them are done.
    ///
    /// Results arrive in completion order, not submission order. A failing
    /// task never cancels its siblings.
    pub async fn run<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        work: F,
        progress: Option<ProgressFn<'_>>,
    ) -> Vec<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let permits = Arc::new(Semaphore::new(self.limit));
        let mut set = JoinSet::new();

        for item in items {
            let permits = Arc::clone(&permits);
            let task = work(item);
            set.spawn(async move {
                // the semaphore is never closed, so acquisition only waits
                let _permit = permits.acquire_owned().await.ok();
                task.await
            });
        }

        let mut results = Vec::with_capacity(total);
        let mut completed = 0;
        while let Some(joined) = set.join_next().await {
            completed += 1;
            match joined {
                Ok(result) => results.push(result),
                Err(err) => error!("Comparison task aborted: {}", err),
            }
            if let Some(report) = progress {
                report(completed, total);
            }
        }
        results
    }
}
