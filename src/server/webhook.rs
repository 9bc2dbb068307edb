//! `POST /telnyx/webhook` (§4.8, §6): the carrier's call-control event feed.
//!
//! Grounded on `examples/original_source/bridge/main.py`'s webhook route,
//! which dispatches on `data.event_type` into `call_manager`'s
//! `handle_call_answered`/`handle_call_hangup`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::server::ServerState;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookData {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    call_control_id: Option<String>,
}

/// Every event type is 200'd, per §6: unhandled events are just logged, never
/// rejected, and a payload missing `call_control_id` is tolerated the same
/// way the reference's dict-based `.get(...)` parsing is.
pub async fn webhook_handler(State(state): State<ServerState>, Json(body): Json<WebhookBody>) -> StatusCode {
    let call_control_id = body.data.payload.call_control_id;
    match (body.data.event_type.as_str(), call_control_id) {
        ("call.answered", Some(call_control_id)) => {
            state.engine.handle_call_answered(&call_control_id).await;
        }
        ("call.hangup", Some(call_control_id)) => {
            state.engine.handle_call_hangup(&call_control_id).await;
        }
        (other, call_control_id) => {
            info!(event_type = other, ?call_control_id, "unhandled carrier webhook event");
        }
    }
    StatusCode::OK
}
