//! # ember-api
//!
//! Inbound HTTP surface: the server-server federation endpoints every peer
//! calls into us through, plus a minimal client-server surface sufficient
//! to originate a room and send events into it locally. Every route that
//! mutates the room DAG goes through [`ember_vm::Pipeline`] exactly like a
//! federated event would — there is no separate write path.

pub mod error;
pub mod routes;

use std::sync::Arc;

use ember_common::context::Context;
use ember_federation::{FederationClient, ServerSigningKey};
use ember_head::HeadTracker;
use ember_store::Store;
use ember_vm::Pipeline;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub store: Store,
    pub heads: HeadTracker,
    pub pipeline: Pipeline,
    pub federation: Arc<FederationClient>,
    pub signing_key: Arc<ServerSigningKey>,
    pub ctx: Context,
}

impl AppState {
    pub fn server_name(&self) -> &str {
        self.ctx.server_name()
    }
}

/// Build the complete router: federation endpoints under `/_matrix/federation`
/// and `/_matrix/key`, the client surface under `/_matrix/client`, and a
/// bare `/health` for load balancers.
pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(routes::federation::router())
        .merge(routes::client::router())
        .merge(routes::health::router())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
