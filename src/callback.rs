//! Posts status/transcript/completion events to the external orchestrator
//! (§4.7, §6's "Callback emitter (outbound)").
//!
//! Grounded on `examples/original_source/bridge/call_manager.py::send_callback`;
//! the tagged outbound-event enum follows the teacher's
//! `server/realtime_voice.rs` `ClientMessage`/`ServerMessage` pattern.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::warn;

use crate::engine::state::{CallStatus, TranscriptEntry};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// One outbound callback payload. Always carries `call_id` plus an
/// event-specific body (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallbackEvent {
    StatusUpdate { call_id: String, status: CallStatus },
    TranscriptUpdate { call_id: String, transcript_entry: TranscriptEntry },
    CallCompleted {
        call_id: String,
        status: CallStatus,
        summary: String,
        duration_seconds: f64,
        transcript: Vec<TranscriptEntry>,
    },
}

/// Posts callback events with a bearer token, over a process-wide pooled
/// client (§4.7). Every send is best-effort: failures are logged and never
/// propagate to the engine (§7).
#[derive(Clone)]
pub struct CallbackClient {
    http: Client,
    secret: String,
}

impl CallbackClient {
    pub fn new(http: Client, secret: String) -> Self {
        Self { http, secret }
    }

    /// Send `event` to `callback_url`. Logs and swallows any failure.
    pub async fn send(&self, callback_url: &str, event: CallbackEvent) {
        let result = self
            .http
            .post(callback_url)
            .bearer_auth(&self.secret)
            .timeout(CALLBACK_TIMEOUT)
            .json(&event)
            .send()
            .await;

        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = %resp.status(), callback_url, "callback delivery rejected");
            }
            Err(err) => {
                warn!(error = %err, callback_url, "callback delivery failed");
            }
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_update_serializes_with_tag_and_call_id() {
        let event = CallbackEvent::StatusUpdate {
            call_id: "c1".to_string(),
            status: CallStatus::Dialing,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "status_update");
        assert_eq!(json["call_id"], "c1");
        assert_eq!(json["status"], "dialing");
    }

    #[test]
    fn call_completed_carries_full_transcript() {
        let event = CallbackEvent::CallCompleted {
            call_id: "c1".to_string(),
            status: CallStatus::Completed,
            summary: "Booked the table.".to_string(),
            duration_seconds: 42.0,
            transcript: Vec::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "call_completed");
        assert_eq!(json["duration_seconds"], 42.0);
    }
}
