//! Client-server API surface. Covers the slice the end-to-end scenarios
//! exercise directly: discovering supported versions, creating a room, and
//! sending events into one. There is no login/session subsystem here —
//! every handler trusts an `X-Ember-User-Id` header naming the acting
//! local user, a stand-in for the access-token exchange a full
//! client-server implementation would have (see `DESIGN.md`).

pub mod rooms;
pub mod versions;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(versions::router()).merge(rooms::router())
}
