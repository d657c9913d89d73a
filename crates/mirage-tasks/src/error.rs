//! Error types for job pipelines.

use thiserror::Error;

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that can occur while running a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// A job panicked.
    #[error("job '{job}' panicked")]
    Panicked {
        /// Id of the job.
        job: String,
    },

    /// A job was cancelled before it finished, usually because the runtime
    /// shut down.
    #[error("job '{job}' was cancelled")]
    Cancelled {
        /// Id of the job.
        job: String,
    },
}

impl TaskError {
    /// Returns the id of the failed job.
    pub fn job(&self) -> &str {
        match self {
            Self::Panicked { job } | Self::Cancelled { job } => job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskError::Panicked {
            job: "resize".to_string(),
        };
        assert_eq!(err.to_string(), "job 'resize' panicked");
        assert_eq!(err.job(), "resize");
    }
}
