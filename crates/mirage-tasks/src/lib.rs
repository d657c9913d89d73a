//! # Mirage Tasks
//!
//! Job pipelines for Mirage applications.
//!
//! A [`Pipeline`] runs a set of independent [`Job`]s against one shared
//! input and collects their outputs by job id. Whether the jobs run in
//! parallel is decided once, when the pipeline is built:
//!
//! | Mode | Inside a tokio runtime | Outside |
//! |------|------------------------|---------|
//! | [`ExecutionMode::Parallel`] | [`TokioExecutor`] | [`SequentialExecutor`] |
//! | [`ExecutionMode::Sequential`] | [`SequentialExecutor`] | [`SequentialExecutor`] |
//!
//! A custom [`ParallelExecutor`] can be supplied with
//! [`Pipeline::with_executor`].

#![doc(html_root_url = "https://docs.rs/mirage-tasks/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod executor;
mod job;
mod pipeline;

pub use error::{TaskError, TaskResult};
pub use executor::{ExecutionMode, NamedJob, ParallelExecutor, SequentialExecutor, TokioExecutor};
pub use job::Job;
pub use pipeline::Pipeline;
