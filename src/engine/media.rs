//! Per-WS media connection handling (§4.6.4) and the phone→AI pump
//! (§4.6.5). One `run` call handles exactly one carrier media WebSocket
//! connection from upgrade to close; the carrier may open several of these
//! in sequence for the same call (early-media, periodic reconnects).
//!
//! Grounded on `examples/original_source/bridge/call_manager.py`'s
//! `handle_telnyx_websocket`, `_wait_for_answer_or_ws_close`, and
//! `_phone_to_gemini`.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::audio::codec::{resample, ulaw_to_pcm16le};
use crate::carrier::framer::{self, CarrierFrame, Encoding};
use crate::engine::lifecycle::{open_session_and_spawn_reader, Engine};
use crate::engine::state::{CallStatus, MediaWsHandle};
use crate::registry::SharedCall;

/// Carrier media WS audio input is always converted to this rate before
/// being handed to the voice-AI session (§6).
const VOICE_AI_INPUT_RATE: u32 = 16000;

/// Handle one incoming carrier media WebSocket for `call_id` end to end.
pub async fn run(engine: &Engine, call_id: String, socket: WebSocket) {
    let Some(shared) = engine.registry.get(&call_id).await else {
        warn!(call_id, "media WS for unknown call; closing");
        close_policy_violation(socket).await;
        return;
    };

    let (mut ws_tx, mut ws_rx) = socket.split();

    let already_answered = *shared.lock().await.answered_rx.borrow();
    if !already_answered {
        let mut answered_rx = shared.lock().await.answered_rx.clone();
        loop {
            tokio::select! {
                changed = answered_rx.changed() => {
                    if changed.is_err() {
                        return; // record's sender half dropped; call is gone
                    }
                    if *answered_rx.borrow() {
                        break;
                    }
                }
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Close(_))) | None => {
                            // Early-media WS closed before answer (§4.6.4 step 2): return
                            // cleanly without touching the record.
                            return;
                        }
                        Some(Ok(_)) => continue, // drain ringback-era frames
                        Some(Err(_)) => return,
                    }
                }
            }
        }
    }

    let first_connection = shared.lock().await.voice_session.is_none();
    if first_connection {
        {
            let mut record = shared.lock().await;
            record.transition_to(CallStatus::Connected);
            record.connected_time = Some(chrono::Utc::now());
        }
        let callback_url = shared.lock().await.callback_url.clone();
        if let Some(url) = callback_url {
            engine
                .callback
                .send(
                    &url,
                    crate::callback::CallbackEvent::StatusUpdate {
                        call_id: call_id.clone(),
                        status: CallStatus::Connected,
                    },
                )
                .await;
        }

        if let Err(err) = open_session_and_spawn_reader(engine, &shared, &call_id).await {
            warn!(call_id, error = %err, "voice-AI session open failed; failing call");
            engine.complete_call(&call_id, shared, true).await;
            return;
        }
        info!(call_id, "voice-AI session opened, persistent reader started");
    } else {
        info!(call_id, "media WS reconnect; reusing existing voice-AI session");
    }

    let generation = {
        let mut record = shared.lock().await;
        let generation = record.current_media_ws.as_ref().map(|h| h.generation + 1).unwrap_or(1);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);
        record.current_media_ws = Some(MediaWsHandle { outbound_tx, generation });
        tokio::spawn(forward_outbound(outbound_rx, ws_tx));
        generation
    };

    phone_to_ai_pump(&shared, &mut ws_rx).await;

    let mut record = shared.lock().await;
    if record.current_media_ws.as_ref().map(|h| h.generation) == Some(generation) {
        record.current_media_ws = None;
    }
    // Completion is driven by the hangup webhook or a safety timer, not here (§4.6.4 step 7).
}

/// Drains the per-WS outbound channel into the real WebSocket sink. Runs
/// until the channel closes (WS replaced) or the send fails (WS gone).
async fn forward_outbound(
    mut outbound_rx: mpsc::Receiver<String>,
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
) {
    while let Some(text) = outbound_rx.recv().await {
        if ws_tx.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}

/// §4.6.5: read carrier frames, convert to PCM LE 16 kHz, forward to the
/// voice-AI session. Runs until the WS closes or a `stop` frame arrives.
async fn phone_to_ai_pump(
    shared: &SharedCall,
    ws_rx: &mut futures_util::stream::SplitStream<WebSocket>,
) {
    loop {
        let msg = match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => text.to_string(),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                warn!(error = %err, "media WS read error; ending pump for this connection");
                break;
            }
        };

        let frame = match framer::parse_frame(&msg) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "malformed carrier media frame; ignoring");
                continue;
            }
        };

        match frame {
            CarrierFrame::Start(format) => {
                let mut record = shared.lock().await;
                record.stream_codec = format.encoding;
                record.stream_sample_rate = format.sample_rate;
                record.stream_big_endian = format.big_endian;
            }
            CarrierFrame::Stop => break,
            CarrierFrame::Media(Some(audio)) => {
                let (codec, sample_rate, sender) = {
                    let record = shared.lock().await;
                    (
                        record.stream_codec,
                        record.stream_sample_rate,
                        record.voice_session.as_ref().map(|s| s.audio_sender()),
                    )
                };

                let pcm = match codec {
                    Encoding::Pcmu => {
                        let pcm = ulaw_to_pcm16le(&audio);
                        resample(&pcm, sample_rate, VOICE_AI_INPUT_RATE)
                    }
                    Encoding::L16 => resample(&audio, sample_rate, VOICE_AI_INPUT_RATE),
                };

                if let Some(sender) = sender {
                    if let Err(err) = sender.send(pcm).await {
                        warn!(error = %err, "failed to forward audio to voice-AI session");
                    }
                }
            }
            CarrierFrame::Media(None) | CarrierFrame::Other => {}
        }
    }
}

async fn close_policy_violation(socket: WebSocket) {
    let (mut ws_tx, _) = socket.split();
    let _ = ws_tx
        .send(Message::Close(Some(CloseFrame {
            code: 1008,
            reason: "unknown call_id".into(),
        })))
        .await;
}
