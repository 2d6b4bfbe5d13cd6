//! `GET /_matrix/client/versions` — unauthenticated capability discovery.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/_matrix/client/versions", get(versions))
}

#[derive(Serialize)]
struct VersionsResponse {
    versions: Vec<&'static str>,
}

async fn versions() -> Json<VersionsResponse> {
    Json(VersionsResponse { versions: vec!["v1.1", "v1.2", "v1.3", "v1.4", "v1.5"] })
}
