//! `GET /_matrix/key/v2/server` — this server's self-signed key document.
//! The one federation endpoint that must be reachable with no prior key
//! exchange, since it's how every other endpoint's signatures get checked.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use ember_common::error::EmberError;
use ember_federation::ServerKeyDocument;

use crate::error::federation_err;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/_matrix/key/v2/server", get(server_key))
}

async fn server_key(State(state): State<Arc<AppState>>) -> Result<Json<ServerKeyDocument>, EmberError> {
    let doc = state
        .signing_key
        .to_key_document(state.server_name(), Default::default())
        .map_err(federation_err)?;
    Ok(Json(doc))
}
