//! The persistent AI→phone reader task (§4.6.6): one per call, surviving
//! every carrier media-WS reconnect, pacing outbound audio in real time
//! (§4.6.7) and reassembling turn-aligned transcript entries (§4.6.8).
//!
//! Grounded on `examples/original_source/bridge/call_manager.py::_gemini_reader`
//! and `_flush_transcript_buffer`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::audio::codec::{chunk, chunk_bytes_for_20ms, resample, swap_endianness16};
use crate::callback::{CallbackClient, CallbackEvent};
use crate::engine::state::{TranscriptEntry, TranscriptSpeaker};
use crate::registry::CallRegistry;
use crate::voiceai::session::{Speaker, VoiceEvent, VoiceEventReceiver};

/// Audio arrives from the voice-AI at this fixed native sample rate (§6).
const VOICE_AI_OUTPUT_RATE: u32 = 24000;
const CHUNK_DURATION: Duration = Duration::from_millis(20);
const MAX_CALL_DURATION: Duration = Duration::from_secs(5 * 60);

/// Drives one call's entire AI→phone side for the life of the call.
/// `stop_rx` fires when `_complete_call` wants to cancel it early.
pub async fn run(
    call_id: String,
    registry: Arc<CallRegistry>,
    callback: CallbackClient,
    mut events: VoiceEventReceiver,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = &mut stop_rx => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(shared) = registry.get(&call_id).await else {
            break;
        };

        if hit_max_duration(&shared).await {
            info!(call_id, "max-duration safety cap reached in reader; stopping");
            break;
        }

        match event {
            VoiceEvent::AudioChunk(pcm) => {
                send_paced_audio(&call_id, &shared, pcm).await;
            }
            VoiceEvent::Interrupted => {
                let mut record = shared.lock().await;
                record.next_send_time = None;
                if let Some(entry) = flush_buffer(&mut record.agent_buffer, TranscriptSpeaker::Agent) {
                    drop(record);
                    append_and_notify(&shared, &callback, &call_id, entry).await;
                }
            }
            VoiceEvent::TurnComplete => {
                let mut record = shared.lock().await;
                if let Some(entry) = flush_buffer(&mut record.agent_buffer, TranscriptSpeaker::Agent) {
                    drop(record);
                    append_and_notify(&shared, &callback, &call_id, entry).await;
                }
            }
            VoiceEvent::Transcript { speaker, text } => {
                let mut record = shared.lock().await;
                let opposite = match speaker {
                    Speaker::Agent => flush_buffer(&mut record.callee_buffer, TranscriptSpeaker::Callee),
                    Speaker::Callee => flush_buffer(&mut record.agent_buffer, TranscriptSpeaker::Agent),
                };
                match speaker {
                    Speaker::Agent => record.agent_buffer.push_str(&text),
                    Speaker::Callee => record.callee_buffer.push_str(&text),
                }
                drop(record);
                if let Some(entry) = opposite {
                    append_and_notify(&shared, &callback, &call_id, entry).await;
                }
            }
            VoiceEvent::Closed => {
                warn!(call_id, "voice-AI session closed; reader exiting, no automatic reopen");
                let mut record = shared.lock().await;
                record.voice_session = None;
                break;
            }
        }
    }
}

async fn hit_max_duration(shared: &crate::registry::SharedCall) -> bool {
    let record = shared.lock().await;
    match record.connected_time {
        Some(connected) => Utc::now().signed_duration_since(connected).to_std().unwrap_or_default() > MAX_CALL_DURATION,
        None => false,
    }
}

/// Resample/swap/chunk one AI audio response and send it to whichever media
/// WS is currently active, one 20 ms chunk at a time, obeying §4.6.7's
/// pacing law. If `current_media_ws` changes mid-batch, the rest of the
/// batch is dropped rather than sent to the new, unrelated connection.
async fn send_paced_audio(call_id: &str, shared: &crate::registry::SharedCall, pcm_24k: Vec<u8>) {
    let (target_rate, big_endian, generation) = {
        let record = shared.lock().await;
        (
            record.stream_sample_rate,
            record.stream_big_endian,
            record.current_media_ws.as_ref().map(|h| h.generation),
        )
    };

    let Some(batch_generation) = generation else {
        let mut record = shared.lock().await;
        record.audio_dropped_count += 1;
        return;
    };

    let resampled = resample(&pcm_24k, VOICE_AI_OUTPUT_RATE, target_rate);
    let wire_order = if big_endian { swap_endianness16(&resampled) } else { resampled };
    let chunk_size = chunk_bytes_for_20ms(target_rate);
    let chunks = chunk(&wire_order, chunk_size);

    for piece in chunks {
        let sender = {
            let record = shared.lock().await;
            match &record.current_media_ws {
                Some(handle) if handle.generation == batch_generation => Some(handle.outbound_tx.clone()),
                _ => None,
            }
        };

        let Some(sender) = sender else {
            let mut record = shared.lock().await;
            record.audio_dropped_count += 1;
            break;
        };

        let frame = crate::carrier::framer::format_audio_message(&piece);
        if sender.send(frame).await.is_err() {
            let mut record = shared.lock().await;
            record.audio_dropped_count += 1;
            continue;
        }
        {
            let mut record = shared.lock().await;
            record.audio_sent_count += 1;
        }

        pace(call_id, shared).await;
    }
}

/// Apply the §4.6.7 pacing law for one chunk already sent.
async fn pace(_call_id: &str, shared: &crate::registry::SharedCall) {
    let sleep_for = {
        let mut record = shared.lock().await;
        let now = Instant::now();
        let next = record.next_send_time.unwrap_or(now) + CHUNK_DURATION;
        let sleep_for = next.checked_duration_since(now);
        record.next_send_time = Some(if sleep_for.is_some() { next } else { now });
        sleep_for
    };
    if let Some(duration) = sleep_for {
        tokio::time::sleep(duration).await;
    }
}

/// Flush a transcript buffer into one entry if non-empty (§4.6.8).
pub fn flush_buffer(buffer: &mut String, speaker: TranscriptSpeaker) -> Option<TranscriptEntry> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        buffer.clear();
        return None;
    }
    let entry = TranscriptEntry {
        speaker,
        text: trimmed.to_string(),
        timestamp: Utc::now(),
    };
    buffer.clear();
    Some(entry)
}

async fn append_and_notify(
    shared: &crate::registry::SharedCall,
    callback: &CallbackClient,
    call_id: &str,
    entry: TranscriptEntry,
) {
    let callback_url = {
        let mut record = shared.lock().await;
        record.transcript.push(entry.clone());
        record.callback_url.clone()
    };
    if let Some(url) = callback_url {
        callback
            .send(
                &url,
                CallbackEvent::TranscriptUpdate {
                    call_id: call_id.to_string(),
                    transcript_entry: entry,
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_buffer_trims_and_clears_non_empty_text() {
        let mut buf = "  hello there  ".to_string();
        let entry = flush_buffer(&mut buf, TranscriptSpeaker::Agent).unwrap();
        assert_eq!(entry.text, "hello there");
        assert_eq!(entry.speaker, TranscriptSpeaker::Agent);
        assert!(buf.is_empty());
    }

    #[test]
    fn flush_buffer_on_empty_text_returns_none() {
        let mut buf = "   ".to_string();
        assert!(flush_buffer(&mut buf, TranscriptSpeaker::Callee).is_none());
        assert!(buf.is_empty());
    }
}
