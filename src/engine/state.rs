//! The call record and its state machine (§3, §4.6.1).
//!
//! Field-for-field grounded on `examples/original_source/bridge/call_manager.py`'s
//! `CallState` dataclass; the monotonic-status invariant is enforced in
//! `CallRecord::transition_to` rather than left to callers.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::voiceai::session::{Speaker, VoiceSessionHandle};

/// Lifecycle status, per the §4.6.1 state diagram. `Completed` and `Failed`
/// are terminal — once reached, no further transition is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Dialing,
    Ringing,
    Connected,
    Completed,
    Failed,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }
}

/// One transcript entry: a flushed, speaker-attributed utterance.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TranscriptEntry {
    pub speaker: TranscriptSpeaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSpeaker {
    Agent,
    Callee,
}

impl From<Speaker> for TranscriptSpeaker {
    fn from(s: Speaker) -> Self {
        match s {
            Speaker::Agent => TranscriptSpeaker::Agent,
            Speaker::Callee => TranscriptSpeaker::Callee,
        }
    }
}

/// A handle to whichever carrier media WebSocket is currently active for a
/// call, swapped out on each reconnect (§5's publisher/subscriber note).
pub struct MediaWsHandle {
    pub outbound_tx: tokio::sync::mpsc::Sender<String>,
    /// Monotonically increasing id so the reader can tell two handles apart
    /// even if a new WS happens to reuse the same channel capacity/shape.
    pub generation: u64,
}

/// All mutable state for one in-flight call. Owned behind
/// `Arc<tokio::sync::Mutex<CallRecord>>` in the registry; touched only by
/// that call's own tasks (§5).
pub struct CallRecord {
    pub call_id: String,
    pub carrier_call_id: Option<String>,
    pub phone_number: String,
    pub briefing: String,
    pub language: String,
    pub user_name: String,
    pub callback_url: Option<String>,

    pub status: CallStatus,
    pub transcript: Vec<TranscriptEntry>,

    pub start_time: DateTime<Utc>,
    pub connected_time: Option<DateTime<Utc>>,

    /// `true` once the carrier reports the call answered. A `watch` channel
    /// (not a one-shot) because every media-WS connection — including
    /// early-media ones that arrive before answer — needs its own
    /// subscription to race against its own socket closing.
    pub answered_tx: watch::Sender<bool>,
    pub answered_rx: watch::Receiver<bool>,

    pub voice_session: Option<VoiceSessionHandle>,
    pub current_media_ws: Option<MediaWsHandle>,
    pub reader_task: Option<JoinHandle<()>>,
    /// Sends on this to ask the persistent reader task to stop cooperatively
    /// (§4.6.9 step 3); consumed by `engine::lifecycle::complete_call`.
    pub reader_stop_tx: Option<tokio::sync::oneshot::Sender<()>>,

    pub stream_codec: crate::carrier::framer::Encoding,
    pub stream_sample_rate: u32,
    pub stream_big_endian: bool,

    pub agent_buffer: String,
    pub callee_buffer: String,

    pub audio_sent_count: u64,
    pub audio_dropped_count: u64,

    /// Monotonic deadline used by the paced sender (§4.6.7); `None` until
    /// the first chunk of a batch has been sent.
    pub next_send_time: Option<std::time::Instant>,
}

impl CallRecord {
    pub fn new(
        call_id: String,
        phone_number: String,
        briefing: String,
        language: String,
        user_name: String,
        callback_url: Option<String>,
    ) -> Self {
        let (answered_tx, answered_rx) = watch::channel(false);
        Self {
            call_id,
            carrier_call_id: None,
            phone_number,
            briefing,
            language,
            user_name,
            callback_url,
            status: CallStatus::Pending,
            transcript: Vec::new(),
            start_time: Utc::now(),
            connected_time: None,
            answered_tx,
            answered_rx,
            voice_session: None,
            current_media_ws: None,
            reader_task: None,
            reader_stop_tx: None,
            stream_codec: crate::carrier::framer::Encoding::default(),
            stream_sample_rate: 16000,
            stream_big_endian: false,
            agent_buffer: String::new(),
            callee_buffer: String::new(),
            audio_sent_count: 0,
            audio_dropped_count: 0,
            next_send_time: None,
        }
    }

    /// Move to `next`, enforcing monotonicity: once terminal, always
    /// terminal (§8 invariant 5). Returns `false` and leaves status
    /// untouched if the transition would violate that.
    pub fn transition_to(&mut self, next: CallStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }

    pub fn signal_answered(&mut self) {
        let _ = self.answered_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CallRecord {
        CallRecord::new(
            "c1".to_string(),
            "+15005550006".to_string(),
            "Book a table".to_string(),
            "auto".to_string(),
            "Sam".to_string(),
            Some("https://orchestrator.example/callback".to_string()),
        )
    }

    #[test]
    fn new_record_starts_pending_with_empty_transcript() {
        let r = record();
        assert_eq!(r.status, CallStatus::Pending);
        assert!(r.transcript.is_empty());
    }

    #[test]
    fn transition_from_terminal_is_rejected() {
        let mut r = record();
        assert!(r.transition_to(CallStatus::Completed));
        assert!(!r.transition_to(CallStatus::Connected));
        assert_eq!(r.status, CallStatus::Completed);
    }

    #[test]
    fn transition_chain_to_terminal_succeeds() {
        let mut r = record();
        assert!(r.transition_to(CallStatus::Dialing));
        assert!(r.transition_to(CallStatus::Connected));
        assert!(r.transition_to(CallStatus::Failed));
        assert_eq!(r.status, CallStatus::Failed);
    }
}
