//! `GET /_matrix/federation/v1/query/{queryType}` — directory and profile
//! lookups. Scoped out for this server: it serves content it has already
//! committed (events, state, auth chains) rather than the separate
//! directory/profile data model `query` covers. Routed but not populated,
//! so a peer calling it gets a clean 404 instead of a connection error.

use std::sync::Arc;

use axum::extract::Path;
use axum::{routing::get, Router};
use ember_common::error::EmberError;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/_matrix/federation/v1/query/{query_type}", get(query))
}

async fn query(Path(query_type): Path<String>) -> EmberError {
    EmberError::NotFound { resource: format!("query type {query_type}") }
}
