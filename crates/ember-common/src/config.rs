//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults.
//!
//! Field set mirrors the configuration surface enumerated in `SPEC_FULL.md` §6.

use std::sync::OnceLock;

use serde::Deserialize;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG.get().expect("Config not initialized. Call ember_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development).
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults.
        .set_default("origin", "localhost")?
        .set_default("server_name", "localhost")?
        .set_default("listen", true)?
        .set_default("listen_addr", "0.0.0.0:8448")?
        .set_default("read_only", false)?
        .set_default("write_avoid", false)?
        .set_default("autoload_modules", true)?
        .set_default("auto_compact", true)?
        .set_default("direct_io", false)?
        .set_default("ipv6", true)?
        .set_default("pitrec", "absolute")?
        .set_default("open_repair", false)?
        .set_default("bootstrap_vector_path", "")?
        .set_default("store.path", "./data/ember.db")?
        .set_default("log.filter", "ember=info,tower_http=info")?
        .set_default("federation.request_timeout_secs", 30)?
        .set_default("federation.max_retry_attempts", 8)?
        .set_default("federation.retry_base_secs", 2)?
        .set_default("federation.retry_cap_secs", 60)?
        .set_default("federation.circuit_break_threshold", 5)?
        .set_default("federation.circuit_break_ttl_secs", 3600)?
        .set_default("vm.staging_queue_capacity", 4096)?
        .set_default("vm.ancestor_fetch_depth_budget", 100)?
        // Optional config file.
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (EMBER__ORIGIN, EMBER__STORE__PATH, etc.)
        .add_source(
            config::Environment::with_prefix("EMBER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

/// Crash-recovery policy applied when the store is opened after an unclean
/// shutdown. See `SPEC_FULL.md` §6.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointInTimeRecovery {
    /// Recover to the last known-consistent point, rejecting anything after it.
    Absolute,
    /// Recover to a specific point, accepting later writes as best-effort.
    Point,
    /// Attempt best-effort recovery of whatever can be salvaged.
    Recover,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Server name this instance originates events as (distinct from `server_name`
    /// only when delegating federation to a different host).
    pub origin: String,
    /// Public server name used for federation and in all event IDs/user IDs.
    pub server_name: String,
    /// Accept incoming sockets at all.
    pub listen: bool,
    /// Address the federation + client HTTP listener binds to.
    pub listen_addr: String,
    /// No DB writes at all — fully read-only operation.
    pub read_only: bool,
    /// Writes allowed only when triggered by reconciliation, not live traffic.
    pub write_avoid: bool,
    pub autoload_modules: bool,
    pub auto_compact: bool,
    pub direct_io: bool,
    pub ipv6: bool,
    pub pitrec: PointInTimeRecovery,
    /// Deep repair on open — forces no compaction and CLI-only mode.
    pub open_repair: bool,
    /// Seed events for a fresh DB, empty string if unused.
    pub bootstrap_vector_path: String,
    pub store: StoreConfig,
    pub log: LogConfig,
    pub federation: FederationConfig,
    pub vm: VmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// RocksDB data directory.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"ember=debug,tower_http=debug"`.
    pub filter: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    pub request_timeout_secs: u64,
    pub max_retry_attempts: u32,
    pub retry_base_secs: u64,
    pub retry_cap_secs: u64,
    pub circuit_break_threshold: u32,
    pub circuit_break_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VmConfig {
    /// Bound on the inbound staging queue (backpressure, SPEC_FULL.md §4.3).
    pub staging_queue_capacity: usize,
    /// Max hops the ancestor-fetch suspension will chase before `FETCH_FAILED`.
    pub ancestor_fetch_depth_budget: u32,
}
