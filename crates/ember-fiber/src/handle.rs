//! Fiber handles and the context passed into a fiber's entry closure.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::FiberError;

/// Controls whether a spawned fiber must be `join`ed by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnFlags {
    /// Caller intends to `join()` and observe the result.
    Joinable,
    /// Fire-and-forget; dropping the handle does not cancel the fiber.
    Detached,
}

/// Handle to a running fiber. Dropping a `Joinable` handle without joining
/// leaks the fiber's result but does not cancel it (matches Tokio's own
/// `JoinHandle` drop semantics).
pub struct FiberHandle<T> {
    name: String,
    flags: SpawnFlags,
    join: tokio::task::JoinHandle<T>,
    cancel: CancellationToken,
}

impl<T> FiberHandle<T> {
    pub(crate) fn new(
        name: String,
        flags: SpawnFlags,
        join: tokio::task::JoinHandle<T>,
        cancel: CancellationToken,
    ) -> Self {
        Self { name, flags, join, cancel }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> SpawnFlags {
        self.flags
    }

    /// Request cooperative interruption. The fiber observes this at its
    /// next suspension point (`FiberCx::check`, `yield_now`, `sleep_for`,
    /// a `Dock`/`Latch`/`Mutex` wait) and can catch `FiberError::Interrupted`
    /// to unwind cleanly.
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    /// Forcibly abort the fiber. Uncatchable — any scope guards (`Drop`
    /// impls) the fiber was holding still run, but the fiber body itself
    /// never resumes.
    pub fn terminate(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the fiber to finish, translating panics and aborts into
    /// `FiberError`.
    pub async fn join(self) -> Result<T, FiberError> {
        match self.join.await {
            Ok(value) => Ok(value),
            Err(err) if err.is_cancelled() => Err(FiberError::Terminated),
            Err(err) => Err(FiberError::Panicked(err.to_string())),
        }
    }
}

/// Context given to a fiber's entry closure. Every suspension the fiber
/// performs should go through this handle so `interrupt()` is observed
/// uniformly, rather than the fiber body reaching for `tokio::time`/`tokio::task`
/// directly.
#[derive(Clone)]
pub struct FiberCx {
    cancel: CancellationToken,
}

impl FiberCx {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Raise `Interrupted` if the fiber has been asked to stop. Call at
    /// natural checkpoints in a long-running loop.
    pub fn check(&self) -> Result<(), FiberError> {
        if self.cancel.is_cancelled() {
            Err(FiberError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Yield to the scheduler, then check for interruption.
    pub async fn yield_now(&self) -> Result<(), FiberError> {
        tokio::task::yield_now().await;
        self.check()
    }

    /// Sleep, returning early with `Interrupted` if cancelled mid-sleep.
    pub async fn sleep_for(&self, duration: Duration) -> Result<(), FiberError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(FiberError::Interrupted),
        }
    }

    /// Race an arbitrary future against interruption.
    pub async fn race<F, T>(&self, fut: F) -> Result<T, FiberError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            out = fut => Ok(out),
            _ = self.cancel.cancelled() => Err(FiberError::Interrupted),
        }
    }
}
