//! `GET /telnyx/media-stream?call_id=…` (§4.8, §6): upgrades to the
//! carrier's bidirectional media WebSocket and hands it to the engine.
//!
//! Grounded on `examples/original_source/bridge/main.py`'s
//! `handle_telnyx_websocket` route and the teacher's own
//! `server/mod.rs::websocket_handler`/`handle_websocket` upgrade pattern.

use axum::extract::ws::{CloseFrame, Message, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::SinkExt;
use serde::Deserialize;

use crate::engine::media;
use crate::server::ServerState;

#[derive(Debug, Deserialize)]
pub struct MediaStreamQuery {
    call_id: Option<String>,
}

pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    Query(query): Query<MediaStreamQuery>,
) -> Response {
    match query.call_id {
        Some(call_id) => ws.on_upgrade(move |socket| async move { media::run(&state.engine, call_id, socket).await }),
        None => ws.on_upgrade(|mut socket| async move {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: 1008,
                    reason: "call_id query parameter is required".into(),
                })))
                .await;
        }),
    }
}
