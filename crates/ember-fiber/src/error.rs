//! Failure modes of a fiber, as observed by its joiner.

/// Errors a fiber can terminate with, or that `join` can report.
#[derive(Debug, thiserror::Error)]
pub enum FiberError {
    /// The fiber observed `interrupt()` at a suspension point and unwound
    /// cooperatively. Catchable within the fiber body.
    #[error("fiber interrupted")]
    Interrupted,

    /// The fiber was aborted via `terminate()` before it could return.
    /// Uncatchable — the fiber body never sees this, only the joiner does.
    #[error("fiber terminated")]
    Terminated,

    /// The fiber panicked.
    #[error("fiber panicked: {0}")]
    Panicked(String),

    /// A reactor operation exceeded its deadline.
    #[error("operation timed out")]
    TimedOut,
}
