//! Structured logging setup, shared by every binary and integration test harness.

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Initialize the global `tracing` subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the configured
/// `log.filter` directive. Safe to call once per process; a second call
/// is a no-op (the underlying `try_init` swallows the "already set" error).
pub fn init(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.clone()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
