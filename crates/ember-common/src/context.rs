//! Explicit context object threaded through subsystems instead of ambient
//! globals. Each crate that needs request-scoped identity (which peer this
//! event came from, a correlation id for log lines) takes a `&Context`
//! rather than reading thread-locals or re-deriving it from a connection.

use std::sync::Arc;

use crate::config::AppConfig;

/// Shared, cheaply-cloneable process context.
///
/// Holds only the cross-cutting concerns that belong at the foundation
/// layer (config, correlation id generation). Subsystem-specific shared
/// state (the store handle, the head tracker, the federation client) lives
/// in each subsystem's own `AppState`-style struct and is composed on top
/// of this at the binary level.
#[derive(Clone)]
pub struct Context {
    config: Arc<AppConfig>,
}

impl Context {
    pub fn new(config: &'static AppConfig) -> Self {
        Self {
            config: Arc::new(config.clone()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// This server's own name, used as the `origin` on locally-created events
    /// and as the sender in outbound federation requests.
    pub fn server_name(&self) -> &str {
        &self.config.server_name
    }

    /// A fresh correlation id for tying together log lines from one inbound
    /// request or one VM pipeline run.
    pub fn new_request_id(&self) -> RequestId {
        RequestId(uuid::Uuid::new_v4())
    }
}

/// Correlation id attached to tracing spans for one request/pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(uuid::Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
