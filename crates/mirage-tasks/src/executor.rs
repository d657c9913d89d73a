//! Execution strategies.
//!
//! A [`ParallelExecutor`] takes the jobs of a pipeline and returns their
//! outputs in the order the jobs were given. [`TokioExecutor`] runs each
//! job on the blocking pool, [`SequentialExecutor`] runs them one after the
//! other on the calling task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};

use crate::error::{TaskError, TaskResult};
use crate::job::Job;

/// A job registered under its id.
pub type NamedJob<D, O> = (String, Arc<dyn Job<D, O>>);

/// How a pipeline runs its jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fan out on the tokio blocking pool when a runtime is available.
    Parallel,
    /// Run jobs one at a time.
    #[default]
    Sequential,
}

impl ExecutionMode {
    /// `Parallel` when `enabled`, else `Sequential`.
    #[must_use]
    pub const fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::Parallel
        } else {
            Self::Sequential
        }
    }
}

/// Runs the jobs of a pipeline.
pub trait ParallelExecutor<D, O>: Send + Sync {
    /// Executes every job against `data`.
    ///
    /// Outputs are returned in the order of `jobs`. The first failed job,
    /// in that order, is reported.
    fn execute(&self, data: Arc<D>, jobs: Vec<NamedJob<D, O>>) -> BoxFuture<'_, TaskResult<Vec<(String, O)>>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Runs each job with `tokio::task::spawn_blocking`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl<D, O> ParallelExecutor<D, O> for TokioExecutor
where
    D: Send + Sync + 'static,
    O: Send + 'static,
{
    fn execute(&self, data: Arc<D>, jobs: Vec<NamedJob<D, O>>) -> BoxFuture<'_, TaskResult<Vec<(String, O)>>> {
        Box::pin(async move {
            let (ids, handles): (Vec<String>, Vec<_>) = jobs
                .into_iter()
                .map(|(id, job)| {
                    let data = Arc::clone(&data);
                    let handle = tokio::task::spawn_blocking(move || job.run(&data));
                    (id, handle)
                })
                .unzip();

            tracing::debug!(jobs = ids.len(), "jobs spawned");

            let mut outputs = Vec::with_capacity(ids.len());
            for (id, joined) in ids.into_iter().zip(join_all(handles).await) {
                match joined {
                    Ok(output) => outputs.push((id, output)),
                    Err(e) if e.is_panic() => {
                        tracing::error!(job = %id, "job panicked");
                        return Err(TaskError::Panicked { job: id });
                    }
                    Err(_) => {
                        tracing::warn!(job = %id, "job cancelled");
                        return Err(TaskError::Cancelled { job: id });
                    }
                }
            }
            Ok(outputs)
        })
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}

/// Runs jobs inline, in order.
///
/// A panicking job is caught and reported as [`TaskError::Panicked`]; the
/// remaining jobs are not run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl<D, O> ParallelExecutor<D, O> for SequentialExecutor
where
    D: Send + Sync + 'static,
    O: Send + 'static,
{
    fn execute(&self, data: Arc<D>, jobs: Vec<NamedJob<D, O>>) -> BoxFuture<'_, TaskResult<Vec<(String, O)>>> {
        Box::pin(async move {
            let mut outputs = Vec::with_capacity(jobs.len());
            for (id, job) in jobs {
                match catch_unwind(AssertUnwindSafe(|| job.run(&data))) {
                    Ok(output) => outputs.push((id, output)),
                    Err(_) => {
                        tracing::error!(job = %id, "job panicked");
                        return Err(TaskError::Panicked { job: id });
                    }
                }
            }
            Ok(outputs)
        })
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}
