//! Bidirectional session adapter to the cloud voice-AI service (§4.4).
//!
//! The session outlives any single carrier WebSocket: it is owned by the
//! call record, not by the media connection, and keeps running across
//! carrier reconnects until the call itself ends.

pub mod session;

pub use session::{VoiceEvent, VoiceEventReceiver, VoiceSessionConfig, VoiceSessionHandle};
