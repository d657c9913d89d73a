//! The job contract.

/// A unit of work run by a [`Pipeline`](crate::Pipeline).
///
/// Every job of a pipeline receives the same shared input `D` and produces
/// an output `O`. Jobs run on blocking threads in parallel mode, so they
/// may do CPU-bound or blocking work.
///
/// Closures `Fn(&D) -> O` are jobs.
///
/// # Example
///
/// ```
/// use mirage_tasks::Job;
///
/// struct WordCount;
///
/// impl Job<String, usize> for WordCount {
///     fn run(&self, data: &String) -> usize {
///         data.split_whitespace().count()
///     }
/// }
///
/// assert_eq!(WordCount.run(&"a b c".to_string()), 3);
/// ```
pub trait Job<D, O>: Send + Sync + 'static {
    /// Runs the job against the pipeline input.
    fn run(&self, data: &D) -> O;
}

impl<D, O, F> Job<D, O> for F
where
    F: Fn(&D) -> O + Send + Sync + 'static,
{
    fn run(&self, data: &D) -> O {
        self(data)
    }
}
