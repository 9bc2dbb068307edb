//! Dial/answer/complete control path (§4.6.2, §4.6.3, §4.6.9) plus the two
//! per-call safety timers (§4.6.1).
//!
//! Grounded on `examples/original_source/bridge/call_manager.py::start_call`,
//! `handle_call_answered`, `handle_call_hangup`, `_no_answer_timeout`,
//! `_max_duration_timeout`, `_complete_call`, and `end_call`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::callback::{CallbackClient, CallbackEvent};
use crate::carrier::client::CarrierClient;
use crate::config::Config;
use crate::engine::reader;
use crate::engine::state::{CallRecord, CallStatus};
use crate::external;
use crate::registry::{CallRegistry, SharedCall};
use crate::voiceai::session::VoiceSessionHandle;

const NO_ANSWER_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CALL_DURATION_WITH_GRACE: Duration = Duration::from_secs(5 * 60 + 30);

/// Parameters for `start_call` (§4.6.2), as received from the ingress
/// surface's `/start-call` handler.
#[derive(Debug, Clone)]
pub struct StartCallParams {
    pub call_id: String,
    pub phone_number: String,
    pub briefing: String,
    pub language: String,
    pub user_name: String,
    pub callback_url: String,
}

/// Owns the process-wide collaborators the engine needs and exposes the
/// control-path operations the ingress surface calls into. One instance is
/// constructed in `main`/`ServerState` and shared behind an `Arc` (§5
/// "Global state").
#[derive(Clone)]
pub struct Engine {
    pub config: Arc<Config>,
    pub registry: Arc<CallRegistry>,
    pub carrier: CarrierClient,
    pub callback: CallbackClient,
    /// Shared pooled client for the moderation/summary side calls (§4.7);
    /// distinct from the carrier client, which carries its own base URL
    /// and timeout defaults (§4.3).
    pub http: reqwest::Client,
}

impl Engine {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<CallRegistry>,
        carrier: CarrierClient,
        callback: CallbackClient,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            registry,
            carrier,
            callback,
            http,
        }
    }

    /// §4.6.2: construct the record, dial, arm the safety timers.
    pub async fn start_call(&self, params: StartCallParams) -> anyhow::Result<String> {
        let record = CallRecord::new(
            params.call_id.clone(),
            params.phone_number.clone(),
            params.briefing.clone(),
            params.language.clone(),
            params.user_name.clone(),
            Some(params.callback_url.clone()),
        );
        let shared = self.registry.insert(params.call_id.clone(), record).await;

        let webhook_url = self.config.webhook_url();
        let carrier_call_id = match self.carrier.dial(&params.phone_number, &webhook_url).await {
            Ok(id) => id,
            Err(err) => {
                error!(call_id = %params.call_id, error = %err, "dial failed");
                self.registry.remove(&params.call_id).await;
                self.callback
                    .send(
                        &params.callback_url,
                        CallbackEvent::StatusUpdate {
                            call_id: params.call_id.clone(),
                            status: CallStatus::Failed,
                        },
                    )
                    .await;
                return Err(err);
            }
        };

        {
            let mut record = shared.lock().await;
            record.carrier_call_id = Some(carrier_call_id.clone());
            record.transition_to(CallStatus::Dialing);
        }
        self.registry.bind_carrier_id(&params.call_id, carrier_call_id.clone()).await;
        self.callback
            .send(
                &params.callback_url,
                CallbackEvent::StatusUpdate {
                    call_id: params.call_id.clone(),
                    status: CallStatus::Dialing,
                },
            )
            .await;

        self.arm_timers(params.call_id.clone());

        Ok(carrier_call_id)
    }

    fn arm_timers(&self, call_id: String) {
        let this = self.clone();
        let no_answer_id = call_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(NO_ANSWER_TIMEOUT).await;
            let Some(shared) = this.registry.get(&no_answer_id).await else { return };
            let still_unanswered = {
                let record = shared.lock().await;
                matches!(record.status, CallStatus::Pending | CallStatus::Dialing | CallStatus::Ringing)
            };
            if still_unanswered {
                warn!(call_id = %no_answer_id, "no-answer timeout; failing call");
                this.complete_call(&no_answer_id, shared, true).await;
            }
        });

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(MAX_CALL_DURATION_WITH_GRACE).await;
            let Some(shared) = this.registry.get(&call_id).await else { return };
            let terminal = shared.lock().await.status.is_terminal();
            if !terminal {
                warn!(call_id = %call_id, "max-call-duration safety timeout; forcing completion");
                this.complete_call(&call_id, shared, false).await;
            }
        });
    }

    /// §4.6.3: carrier reports the call answered.
    pub async fn handle_call_answered(&self, carrier_call_id: &str) {
        let Some(shared) = self.registry.get_by_carrier_id(carrier_call_id).await else {
            warn!(carrier_call_id, "call.answered for unknown carrier call id");
            return;
        };

        let call_id = {
            let mut record = shared.lock().await;
            record.signal_answered();
            record.call_id.clone()
        };

        let stream_url = self.config.media_stream_url(&call_id);
        if let Err(err) = self.carrier.start_streaming(carrier_call_id, &stream_url).await {
            error!(call_id = %call_id, error = %err, "start_streaming failed");
            self.complete_call(&call_id, shared, true).await;
        }
    }

    /// Carrier reports the call ended.
    pub async fn handle_call_hangup(&self, carrier_call_id: &str) {
        let Some(shared) = self.registry.get_by_carrier_id(carrier_call_id).await else {
            // Already completed (e.g. via user-initiated end_call) — a no-op per S5.
            return;
        };
        let call_id = shared.lock().await.call_id.clone();
        self.complete_call(&call_id, shared, false).await;
    }

    /// User-initiated end (`/end-call`): best-effort hangup, then complete.
    pub async fn end_call(&self, call_id: &str) {
        let Some(shared) = self.registry.get(call_id).await else { return };
        let carrier_call_id = shared.lock().await.carrier_call_id.clone();
        if let Some(carrier_call_id) = carrier_call_id {
            if let Err(err) = self.carrier.hangup(&carrier_call_id).await {
                warn!(call_id, error = %err, "hangup failed during end_call; proceeding with cleanup");
            }
        }
        self.complete_call(call_id, shared, false).await;
    }

    /// §4.6.9: idempotent-by-removal completion and cleanup.
    pub async fn complete_call(&self, call_id: &str, shared: SharedCall, failed: bool) {
        // Idempotent: only the caller that successfully removes the record
        // performs cleanup and emits the completion callback.
        if self.registry.get(call_id).await.is_none() {
            return;
        }
        self.registry.remove(call_id).await;

        let (already_terminal, reader_task, reader_stop_tx, voice_session, callback_url) = {
            let mut record = shared.lock().await;
            if record.status.is_terminal() {
                (true, None, None, None, None)
            } else {
                let next = if failed { CallStatus::Failed } else { CallStatus::Completed };
                record.transition_to(next);
                (
                    false,
                    record.reader_task.take(),
                    record.reader_stop_tx.take(),
                    record.voice_session.take(),
                    record.callback_url.clone(),
                )
            }
        };
        if already_terminal {
            return;
        }

        if let Some(stop_tx) = reader_stop_tx {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = reader_task {
            let _ = handle.await;
        }

        if let Some(session) = voice_session {
            if let Err(err) = session.close().await {
                warn!(call_id, error = %err, "error closing voice-AI session during cleanup");
            }
        }

        let (connected_time, agent_buf_entry, callee_buf_entry) = {
            let mut record = shared.lock().await;
            let agent = reader::flush_buffer(&mut record.agent_buffer, crate::engine::state::TranscriptSpeaker::Agent);
            let callee = reader::flush_buffer(&mut record.callee_buffer, crate::engine::state::TranscriptSpeaker::Callee);
            if let Some(entry) = agent.clone() {
                record.transcript.push(entry);
            }
            if let Some(entry) = callee.clone() {
                record.transcript.push(entry);
            }
            (record.connected_time, agent, callee)
        };
        if let Some(url) = callback_url.as_ref() {
            for entry in [agent_buf_entry, callee_buf_entry].into_iter().flatten() {
                self.callback
                    .send(
                        url,
                        CallbackEvent::TranscriptUpdate {
                            call_id: call_id.to_string(),
                            transcript_entry: entry,
                        },
                    )
                    .await;
            }
        }

        let duration_seconds = connected_time
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        let (status, transcript) = {
            let record = shared.lock().await;
            (record.status, record.transcript.clone())
        };

        let summary = if !failed && !transcript.is_empty() {
            match external::generate_summary(&self.http, &self.config.voice_ai, &transcript).await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(call_id, error = %err, "summary generation failed");
                    external::SUMMARY_FALLBACK.to_string()
                }
            }
        } else {
            String::new()
        };

        info!(call_id, status = ?status, duration_seconds, "call completed");

        if let Some(url) = callback_url {
            self.callback
                .send(
                    &url,
                    CallbackEvent::CallCompleted {
                        call_id: call_id.to_string(),
                        status,
                        summary,
                        duration_seconds,
                        transcript,
                    },
                )
                .await;
        }
    }
}

/// Open the voice-AI session and spawn the persistent reader (§4.6.4 step 3's
/// first-connection branch). Returns the stop channel's sender half, stored
/// on the record so `complete_call` can cancel the reader.
pub async fn open_session_and_spawn_reader(
    engine: &Engine,
    shared: &SharedCall,
    call_id: &str,
) -> anyhow::Result<()> {
    let config = {
        let record = shared.lock().await;
        crate::voiceai::session::VoiceSessionConfig {
            ws_url: engine.config.voice_ai.live_ws_url.clone(),
            api_key: engine.config.voice_ai.api_key.clone(),
            model: engine.config.voice_ai.live_model.clone(),
            voice: engine.config.voice_ai.voice.clone(),
            briefing: record.briefing.clone(),
            user_name: record.user_name.clone(),
            language: record.language.clone(),
            sample_rate_hz: 16000,
        }
    };

    let (handle, events) = VoiceSessionHandle::open(config).await?;
    handle
        .send_text_turn(
            "The phone call is now connected. The callee may greet you first or wait for you to \
             speak. Begin the conversation now."
                .to_string(),
        )
        .await?;

    let (stop_tx, stop_rx) = oneshot::channel();
    let reader_registry = engine.registry.clone();
    let reader_callback = engine.callback.clone();
    let reader_call_id = call_id.to_string();
    let reader_task = tokio::spawn(reader::run(reader_call_id, reader_registry, reader_callback, events, stop_rx));

    let mut record = shared.lock().await;
    record.voice_session = Some(handle);
    record.reader_task = Some(reader_task);
    record.reader_stop_tx = Some(stop_tx);
    Ok(())
}
