//! Fiber-facing synchronization primitives. Thin, renamed wrappers over
//! Tokio's async primitives so call sites read as fiber-runtime types, not
//! raw Tokio — and so the few primitives that need predicate-recheck
//! semantics (`Dock`) get it uniformly rather than ad hoc at each call site.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A condition-variable-like wait point. Waiters re-check their predicate
/// after each wake, so spurious wakeups (including the ones `Notify` itself
/// can produce) are always safe.
#[derive(Default)]
pub struct Dock {
    notify: Notify,
}

impl Dock {
    pub fn new() -> Self {
        Self { notify: Notify::new() }
    }

    /// Wait until `predicate` returns true, re-checking after every wake.
    pub async fn wait_until(&self, mut predicate: impl FnMut() -> bool) {
        while !predicate() {
            let notified = self.notify.notified();
            if predicate() {
                return;
            }
            notified.await;
        }
    }

    /// Wake one waiter.
    pub fn notify_one(&self) {
        self.notify.notify_one();
    }

    /// Wake every current waiter.
    pub fn notify_all(&self) {
        self.notify.notify_waiters();
    }
}

/// A countdown latch: fibers block in [`Latch::wait`] until the count
/// reaches zero.
pub struct Latch {
    remaining: AtomicUsize,
    notify: Notify,
}

impl Latch {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self { remaining: AtomicUsize::new(count), notify: Notify::new() })
    }

    /// Decrement the count. Wakes all waiters once it reaches zero.
    pub fn count_down(&self) {
        let prev = self.remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            if n == 0 { None } else { Some(n - 1) }
        });
        if matches!(prev, Ok(1)) {
            self.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Suspend until the count reaches zero. A no-op if it already has.
    pub async fn wait(&self) {
        loop {
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            let notified = self.notify.notified();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Exclusive-access lock. Renamed wrapper over `tokio::sync::Mutex` so
/// subsystems depend on `ember_fiber::Mutex`, not `tokio::sync::Mutex`.
pub struct Mutex<T>(tokio::sync::Mutex<T>);

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self(tokio::sync::Mutex::new(value))
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, T> {
        self.0.lock().await
    }
}

/// Reader/writer lock. Renamed wrapper over `tokio::sync::RwLock`.
pub struct SharedMutex<T>(tokio::sync::RwLock<T>);

impl<T> SharedMutex<T> {
    pub fn new(value: T) -> Self {
        Self(tokio::sync::RwLock::new(value))
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, T> {
        self.0.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, T> {
        self.0.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn dock_wakes_waiter_on_predicate_change() {
        let dock = Arc::new(Dock::new());
        let ready = Arc::new(AtomicBool::new(false));

        let waiter_dock = dock.clone();
        let waiter_ready = ready.clone();
        let waiter = tokio::spawn(async move {
            waiter_dock.wait_until(|| waiter_ready.load(Ordering::Acquire)).await;
        });

        tokio::task::yield_now().await;
        ready.store(true, Ordering::Release);
        dock.notify_all();

        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn latch_releases_all_waiters_at_zero() {
        let latch = Latch::new(2);
        latch.count_down();
        assert_eq!(latch.count(), 1);
        latch.count_down();
        assert_eq!(latch.count(), 0);
        latch.wait().await;
    }
}
