//! Audio bridge — a telephony-to-voice-AI call engine.
//!
//! Drives an outbound carrier call through its lifecycle, holds open a
//! bidirectional voice-AI session across carrier media reconnects, pumps and
//! paces audio between the two, reassembles turn-aligned transcript entries,
//! and reports progress to an external orchestrator over webhooks of its own.

pub mod audio;
pub mod callback;
pub mod carrier;
pub mod config;
pub mod engine;
pub mod external;
pub mod registry;
pub mod server;
pub mod voiceai;

pub use config::Config;
pub use engine::{CallRecord, CallStatus, Engine, StartCallParams};
pub use registry::CallRegistry;
