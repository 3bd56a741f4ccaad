//! Optional HTTP control bridge.
//!
//! Serves the status projection and accepts command lines from outside the
//! process. It shares the console's runtime and only ever reads profiles or
//! enqueues lines, so running without it changes nothing.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::routes;
use crate::sse;
use crate::state::BridgeState;

pub fn router(state: BridgeState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind `bind:port` and serve the bridge in a background task.
///
/// Returns the bound address once the listener is up.
pub async fn start(bind: &str, port: u16, state: BridgeState) -> Result<SocketAddr> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid bridge address {bind}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let local = listener.local_addr().context("bridge local address")?;
    info!(addr = %local, "control bridge listening");

    let app = router(state);
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "control bridge stopped");
        }
    });
    Ok(local)
}
