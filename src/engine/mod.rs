//! The call engine (§4.6): lifecycle state machine, timers, webhook
//! reactions, media-WS reconnection handling, and the two audio pumps.
//!
//! Split the way the spec's own numbering splits it: `state` is the data
//! model (§4.6.1's record/status), `lifecycle` is the dial/answer/complete
//! control path (§4.6.2, §4.6.3, §4.6.9), `media` is the per-WS connection
//! handling and phone→AI pump (§4.6.4, §4.6.5), and `reader` is the
//! persistent AI→phone reader (§4.6.6-§4.6.8).

pub mod lifecycle;
pub mod media;
pub mod reader;
pub mod state;

pub use lifecycle::{Engine, StartCallParams};
pub use state::{CallRecord, CallStatus, TranscriptEntry, TranscriptSpeaker};
