//! Ingress surface (§4.8): HTTP start/end, the carrier media WebSocket, the
//! carrier webhook, bearer-auth middleware, and the process entrypoint that
//! wires them all to one shared `ServerState`.
//!
//! Grounded on the teacher's `server/mod.rs::start`/`ServerState`/`Router`
//! assembly (merge protected/public routers, `TraceLayer`, `CorsLayer`,
//! `axum::serve` over a bound `TcpListener`).

pub mod auth;
pub mod http;
pub mod media_ws;
pub mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::engine::Engine;

/// Shared state behind every handler: just the engine, which in turn owns
/// the config, registry, and the two outbound clients (§4.6, §5).
#[derive(Clone)]
pub struct ServerState {
    pub engine: Engine,
}

/// Build the router and serve it until the process is signalled to stop.
pub async fn serve(config: Arc<Config>, engine: Engine) -> Result<()> {
    let state = ServerState { engine };

    let cors = match state.engine.config.callback_base_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(_) => CorsLayer::permissive(),
    };

    let protected = Router::new()
        .route("/start-call", post(http::start_call_handler))
        .route("/end-call", post(http::end_call_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_bridge_secret));

    let public = Router::new()
        .route("/health", get(http::health_handler))
        .route("/telnyx/media-stream", get(media_ws::media_stream_handler))
        .route("/telnyx/webhook", post(webhook::webhook_handler));

    let app = Router::new()
        .merge(protected)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid BRIDGE_HOST/BRIDGE_PORT")?;

    info!(%addr, "audio bridge listening");
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind listen address")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
