//! `/start-call`, `/end-call`, and `/health` handlers (§4.8, §6).
//!
//! Grounded on the request/response shape of the teacher's
//! `server/http.rs::chat_handler` (typed `Json` request, `(StatusCode,
//! Json(...))` error responses via `IntoResponse`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::StartCallParams;
use crate::external;
use crate::server::ServerState;

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    pub call_id: String,
    pub phone_number: String,
    pub briefing: String,
    pub callback_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_user_name() -> String {
    "the user".to_string()
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub status: &'static str,
    pub telnyx_call_control_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EndCallRequest {
    pub call_id: String,
}

#[derive(Debug, Serialize)]
pub struct EndCallResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

fn bad_request(message: impl Into<String>) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

pub async fn start_call_handler(
    State(state): State<ServerState>,
    Json(req): Json<StartCallRequest>,
) -> axum::response::Response {
    if req.call_id.trim().is_empty() {
        return bad_request("call_id is required");
    }
    if req.phone_number.trim().is_empty() {
        return bad_request("phone_number is required");
    }
    if req.briefing.trim().is_empty() {
        return bad_request("briefing is required");
    }
    if req.callback_url.trim().is_empty() {
        return bad_request("callback_url is required");
    }

    match external::moderate_briefing(&state.engine.http, &state.engine.config.voice_ai, &req.briefing).await {
        Ok(Some(reason)) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "briefing rejected by moderation", "reason": reason })),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, "moderation call failed; proceeding without a verdict");
        }
    }

    let params = StartCallParams {
        call_id: req.call_id,
        phone_number: req.phone_number,
        briefing: req.briefing,
        language: req.language,
        user_name: req.user_name,
        callback_url: req.callback_url,
    };

    match state.engine.start_call(params).await {
        Ok(carrier_call_id) => Json(StartCallResponse {
            status: "ok",
            telnyx_call_control_id: carrier_call_id,
        })
        .into_response(),
        Err(err) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

pub async fn end_call_handler(
    State(state): State<ServerState>,
    Json(req): Json<EndCallRequest>,
) -> impl IntoResponse {
    state.engine.end_call(&req.call_id).await;
    Json(EndCallResponse { status: "ok" })
}

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
