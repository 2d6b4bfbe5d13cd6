//! Process entry point: loads configuration, opens the store, derives (or
//! starts tracking) room heads, loads/generates this server's signing key,
//! and serves the combined federation + client HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use ember_api::{build_router, AppState};
use ember_common::context::Context;
use ember_federation::{FederationClient, KeyManager};
use ember_head::HeadTracker;
use ember_store::{Store, StoreOptions};
use ember_vm::Pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ember_common::config::init()?;
    ember_common::logging::init(config);

    tracing::info!(server_name = %config.server_name, "starting ember");

    let store_opts = StoreOptions { create_if_missing: true, direct_io: config.direct_io, ..Default::default() };
    let store = Store::open(&config.store.path, &store_opts)?;

    let signing_key = KeyManager::new(store.clone()).load_or_generate()?;
    tracing::info!(key_id = %signing_key.key_id(), "federation signing key ready");
    let signing_key = Arc::new(signing_key);

    let federation = Arc::new(FederationClient::new(
        config.server_name.clone(),
        signing_key.clone(),
        config.federation.clone(),
    )?);

    let heads = HeadTracker::new();
    let pipeline = Pipeline::new(store.clone(), heads.clone(), federation.clone());

    let ctx = Context::new(config);
    let state = AppState { store, heads, pipeline, federation, signing_key, ctx };
    let router = build_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
