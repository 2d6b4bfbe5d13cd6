//! `GET /_matrix/federation/v1/version` and `GET /.well-known/matrix/server` —
//! the two endpoints a peer can reach before it has anything of ours
//! cached, alongside the key document.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use ember_federation::types::{ServerVersion, ServerVersionInfo, WellKnownServer};

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/_matrix/federation/v1/version", get(version))
        .route("/.well-known/matrix/server", get(well_known))
}

async fn version(State(_state): State<Arc<AppState>>) -> Json<ServerVersion> {
    Json(ServerVersion {
        server: ServerVersionInfo { name: "ember".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
    })
}

async fn well_known(State(state): State<Arc<AppState>>) -> Json<WellKnownServer> {
    Json(WellKnownServer { server: state.server_name().to_string() })
}
