//! Job pipelines.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::TaskResult;
use crate::executor::{ExecutionMode, NamedJob, ParallelExecutor, SequentialExecutor, TokioExecutor};
use crate::job::Job;

/// A set of independent jobs sharing one input.
///
/// Results are collected by job id once every job has finished, in the
/// order the jobs were added.
///
/// # Example
///
/// ```
/// use mirage_tasks::{ExecutionMode, Pipeline};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let results = Pipeline::new(vec![3, 1, 2], ExecutionMode::Parallel)
///     .add_job("sum", |v: &Vec<i32>| v.iter().sum::<i32>())
///     .add_job("max", |v: &Vec<i32>| v.iter().copied().max().unwrap_or_default())
///     .run()
///     .await
///     .unwrap();
///
/// assert_eq!(results["sum"], 6);
/// assert_eq!(results["max"], 3);
/// # }
/// ```
pub struct Pipeline<D, O> {
    data: Arc<D>,
    jobs: IndexMap<String, Arc<dyn Job<D, O>>>,
    executor: Arc<dyn ParallelExecutor<D, O>>,
}

impl<D, O> Pipeline<D, O>
where
    D: Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates a pipeline over `data`.
    ///
    /// `Parallel` selects the [`TokioExecutor`] when called inside a tokio
    /// runtime. Anything else runs on the [`SequentialExecutor`].
    pub fn new(data: D, mode: ExecutionMode) -> Self {
        let parallel = mode == ExecutionMode::Parallel
            && tokio::runtime::Handle::try_current().is_ok();
        let executor: Arc<dyn ParallelExecutor<D, O>> = if parallel {
            Arc::new(TokioExecutor)
        } else {
            Arc::new(SequentialExecutor)
        };
        Self::with_executor(data, executor)
    }

    /// Creates a pipeline with an explicit executor.
    pub fn with_executor(data: D, executor: Arc<dyn ParallelExecutor<D, O>>) -> Self {
        Self {
            data: Arc::new(data),
            jobs: IndexMap::new(),
            executor,
        }
    }

    /// Adds a job under `id`.
    ///
    /// Adding an id twice replaces the earlier job and keeps its position.
    #[must_use]
    pub fn add_job(mut self, id: impl Into<String>, job: impl Job<D, O>) -> Self {
        self.jobs.insert(id.into(), Arc::new(job));
        self
    }

    /// Returns the shared input.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Returns the job ids in run order.
    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Returns the number of jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if no job was added.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Returns the name of the selected executor.
    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Runs every job and returns their outputs keyed by id.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed job, in insertion order.
    pub async fn run(&self) -> TaskResult<IndexMap<String, O>> {
        let jobs: Vec<NamedJob<D, O>> = self
            .jobs
            .iter()
            .map(|(id, job)| (id.clone(), Arc::clone(job)))
            .collect();

        tracing::debug!(
            jobs = jobs.len(),
            executor = self.executor.name(),
            "running pipeline"
        );

        let outputs = self.executor.execute(Arc::clone(&self.data), jobs).await?;
        Ok(outputs.into_iter().collect())
    }
}

impl<D, O> fmt::Debug for Pipeline<D, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("jobs", &self.jobs.keys().collect::<Vec<_>>())
            .field("executor", &self.executor.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Upper;

    impl Job<String, String> for Upper {
        fn run(&self, data: &String) -> String {
            data.to_uppercase()
        }
    }

    #[test]
    fn test_parallel_without_runtime_is_sequential() {
        let pipeline: Pipeline<String, String> =
            Pipeline::new("x".to_string(), ExecutionMode::Parallel);
        assert_eq!(pipeline.executor_name(), "sequential");
    }

    #[tokio::test]
    async fn test_parallel_inside_runtime_uses_tokio() {
        let pipeline: Pipeline<String, String> =
            Pipeline::new("x".to_string(), ExecutionMode::Parallel);
        assert_eq!(pipeline.executor_name(), "tokio");

        let sequential: Pipeline<String, String> =
            Pipeline::new("x".to_string(), ExecutionMode::Sequential);
        assert_eq!(sequential.executor_name(), "sequential");
    }

    #[tokio::test]
    async fn test_results_follow_insertion_order() {
        let results = Pipeline::new("mirage".to_string(), ExecutionMode::Parallel)
            .add_job("upper", Upper)
            .add_job("reversed", |s: &String| s.chars().rev().collect::<String>())
            .add_job("len", |s: &String| s.len().to_string())
            .run()
            .await
            .unwrap();

        let keys: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["upper", "reversed", "len"]);
        assert_eq!(results["upper"], "MIRAGE");
        assert_eq!(results["reversed"], "egarim");
        assert_eq!(results["len"], "6");
    }

    #[tokio::test]
    async fn test_duplicate_id_overwrites_in_place() {
        let pipeline = Pipeline::new(2_u64, ExecutionMode::Sequential)
            .add_job("a", |n: &u64| n + 1)
            .add_job("b", |n: &u64| n + 2)
            .add_job("a", |n: &u64| n * 100);

        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.job_ids().collect::<Vec<_>>(), vec!["a", "b"]);

        let results = pipeline.run().await.unwrap();
        assert_eq!(results["a"], 200);
        assert_eq!(results["b"], 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_jobs_run_concurrently() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut pipeline = Pipeline::new((), ExecutionMode::Parallel);
        for i in 0..4 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pipeline = pipeline.add_job(format!("job-{i}"), move |_: &()| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                running.fetch_sub(1, Ordering::SeqCst);
                i
            });
        }

        let results = pipeline.run().await.unwrap();
        assert_eq!(results.len(), 4);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let err = Pipeline::new(0_i32, ExecutionMode::Parallel)
            .add_job("ok", |n: &i32| *n)
            .add_job("bad", |_: &i32| -> i32 { panic!("bad job") })
            .run()
            .await
            .unwrap_err();

        assert_eq!(err, TaskError::Panicked { job: "bad".to_string() });
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline: Pipeline<(), ()> = Pipeline::new((), ExecutionMode::Parallel);
        assert!(pipeline.is_empty());
        assert!(pipeline.run().await.unwrap().is_empty());
    }
}
