//! Bearer-token middleware guarding `/start-call` and `/end-call` (§4.8).
//!
//! Grounded on the shape of the teacher's `server/auth.rs::auth_middleware`
//! (extract `Authorization: Bearer <token>`, 401 on anything else) but
//! stripped down to a single static shared secret — there is no JWT issuance,
//! no login/refresh flow, and no per-user claims here, since the only caller
//! is the orchestrator that also holds `AUDIO_BRIDGE_SECRET`.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use crate::server::ServerState;

pub async fn require_bridge_secret(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == state.engine.config.bridge_secret => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
