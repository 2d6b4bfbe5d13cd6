//! Crate-facing I/O reactor contract.
//!
//! Tokio's own I/O driver already satisfies "each operation registers
//! interest, suspends its fiber, and resumes with a result or error" — this
//! module doesn't reimplement that, it just gives the rest of the workspace
//! a single place to go through (deadline wrapping, typed timeouts) so no
//! other crate imports `tokio::net`/`tokio::time` directly.

use std::future::Future;
use std::time::Duration;

use crate::error::FiberError;

/// Stateless handle onto the reactor contract. Kept as a type (rather than
/// bare free functions) so call sites read `Reactor::with_deadline(...)`
/// uniformly with the rest of the fiber API.
pub struct Reactor;

impl Reactor {
    /// Run `op`, failing with `FiberError::TimedOut` if it doesn't resolve
    /// within `deadline`.
    pub async fn with_deadline<F, T>(deadline: Duration, op: F) -> Result<T, FiberError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(deadline, op)
            .await
            .map_err(|_| FiberError::TimedOut)
    }
}
