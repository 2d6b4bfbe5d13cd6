//! The fiber runtime itself: one OS thread, cooperative scheduling.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::handle::{FiberCx, FiberHandle, SpawnFlags};

/// A single-threaded cooperative runtime. Spawn fibers onto it with
/// [`Runtime::spawn`]; drive it with [`Runtime::block_on`].
///
/// Not `Send`/`Sync` — intentionally confined to the thread that created
/// it, matching the single-OS-thread contract.
pub struct Runtime {
    rt: tokio::runtime::Runtime,
    local: tokio::task::LocalSet,
}

impl Runtime {
    /// Build a new runtime on the current OS thread.
    pub fn new() -> std::io::Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { rt, local: tokio::task::LocalSet::new() })
    }

    /// Spawn a fiber. `entry` receives a [`FiberCx`] for cooperative
    /// suspension and interruption.
    pub fn spawn<F, Fut, T>(&self, name: impl Into<String>, flags: SpawnFlags, entry: F) -> FiberHandle<T>
    where
        F: FnOnce(FiberCx) -> Fut + 'static,
        Fut: Future<Output = T> + 'static,
        T: 'static,
    {
        let name = name.into();
        let cancel = CancellationToken::new();
        let cx = FiberCx::new(cancel.clone());
        tracing::debug!(fiber = %name, "spawning fiber");
        let join = self.local.spawn_local(entry(cx));
        FiberHandle::new(name, flags, join, cancel)
    }

    /// Drive the runtime until `fut` resolves. Any fibers still pending
    /// when this returns keep running until the next `block_on`/`run`
    /// call, exactly like Tokio's own `LocalSet`.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.local.block_on(&self.rt, fut)
    }
}
