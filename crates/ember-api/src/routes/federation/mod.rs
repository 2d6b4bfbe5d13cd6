//! Server-server (federation) API surface: the inbound half of the nine
//! scenarios in the end-to-end walkthrough — transaction delivery, event
//! and state retrieval, backfill, missing-event fill-in, and the two-step
//! join handshake. Every handler here authenticates the caller via
//! [`xmatrix::verify_origin`] before touching the store.

pub mod backfill;
pub mod event;
pub mod join;
pub mod key;
pub mod missing_events;
pub mod query;
pub mod state;
pub mod transaction;
pub mod version;
pub mod xmatrix;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(backfill::router())
        .merge(event::router())
        .merge(join::router())
        .merge(key::router())
        .merge(missing_events::router())
        .merge(query::router())
        .merge(state::router())
        .merge(transaction::router())
        .merge(version::router())
}
