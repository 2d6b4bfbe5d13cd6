//! # ember-fiber
//!
//! Cooperative, single-threaded fiber runtime. Every suspending operation in
//! the rest of the workspace goes through this crate rather than calling
//! `tokio` directly, so the contract stays uniform: one OS thread per
//! runtime, cooperative scheduling, suspension only at documented points,
//! no preemption, and a fiber's failure never takes the process down with
//! it — only its joiner sees it.
//!
//! Realised as a single-threaded Tokio runtime plus `LocalSet`. This isn't a
//! stackful-coroutine implementation; it's the idiomatic Rust shape that
//! gives the same contract (see `DESIGN.md`).

pub mod error;
pub mod handle;
pub mod reactor;
pub mod runtime;
pub mod sync;

pub use error::FiberError;
pub use handle::{FiberHandle, SpawnFlags};
pub use reactor::Reactor;
pub use runtime::Runtime;
pub use sync::{Dock, Latch, Mutex, SharedMutex};

/// Cooperatively yield to the scheduler. The only suspension point with no
/// associated I/O or timer — use this to break up a long synchronous loop
/// so other fibers get a turn.
pub async fn yield_now() {
    tokio::task::yield_now().await;
}

/// Suspend the current fiber until the given instant.
pub async fn sleep_until(deadline: tokio::time::Instant) {
    tokio::time::sleep_until(deadline).await;
}

/// Suspend the current fiber for the given duration.
pub async fn sleep_for(duration: std::time::Duration) {
    tokio::time::sleep(duration).await;
}
