//! Process configuration, read once from the environment at startup (§2a, §6).
//!
//! Grounded on `examples/original_source/bridge/main.py`'s top-level
//! `os.getenv`/`os.environ` reads and `telnyx_handler.py::initiate_call`'s
//! `TELNYX_*` variable names; the fail-fast `Context`-wrapped loading style
//! follows the teacher's `Config::load`.

use anyhow::{Context, Result};

use crate::carrier::client::CarrierConfig;

/// Configuration for the cloud voice-AI adapter: credentials, endpoints, and
/// the model/voice choices baked into the live session and the
/// moderation/summary side calls (§4.4, §4.7's external collaborators).
#[derive(Debug, Clone)]
pub struct VoiceAiConfig {
    pub api_key: String,
    /// Outbound WebSocket endpoint for the bidirectional live session.
    pub live_ws_url: String,
    /// REST base for one-shot `generateContent` calls (moderation, summary).
    pub rest_base: String,
    pub live_model: String,
    pub summary_model: String,
    pub voice: String,
}

/// Top-level process configuration (§6 "Environment configuration").
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret: required on inbound `/start-call`/`/end-call` and sent
    /// as the bearer token on outbound callbacks.
    pub bridge_secret: String,
    /// Public host:port (or host) this process is reachable at, used to
    /// build the `wss://.../telnyx/media-stream?call_id=...` stream URL and
    /// the carrier webhook URL handed to `dial`.
    pub public_url: String,
    /// Origin allowed to receive callbacks and call this bridge's ingress;
    /// used for the CORS layer (§4.8).
    pub callback_base_url: String,
    pub carrier: CarrierConfig,
    pub voice_ai: VoiceAiConfig,
    pub host: String,
    pub port: u16,
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn optional_env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from the environment. Missing required variables
    /// abort startup with a clear error rather than limping along with
    /// empty strings (§6).
    pub fn load() -> Result<Self> {
        let carrier = CarrierConfig {
            api_base: optional_env("TELNYX_API_BASE", "https://api.telnyx.com/v2"),
            api_key: required_env("TELNYX_API_KEY")?,
            connection_id: required_env("TELNYX_CONNECTION_ID")?,
            from_number: required_env("TELNYX_PHONE_NUMBER")?,
        };

        let voice_ai = VoiceAiConfig {
            api_key: required_env("GOOGLE_API_KEY")?,
            live_ws_url: optional_env(
                "VOICE_AI_LIVE_WS_URL",
                "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent",
            ),
            rest_base: optional_env(
                "VOICE_AI_REST_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            live_model: optional_env("VOICE_AI_LIVE_MODEL", "gemini-2.5-flash-native-audio-preview-12-2025"),
            summary_model: optional_env("VOICE_AI_SUMMARY_MODEL", "gemini-2.0-flash"),
            voice: optional_env("VOICE_AI_VOICE", "Kore"),
        };

        Ok(Self {
            bridge_secret: required_env("AUDIO_BRIDGE_SECRET")?,
            public_url: optional_env("BRIDGE_PUBLIC_URL", "localhost:8080"),
            callback_base_url: optional_env("CALLBACK_BASE_URL", "http://localhost:3000"),
            carrier,
            voice_ai,
            host: optional_env("BRIDGE_HOST", "0.0.0.0"),
            port: optional_env("BRIDGE_PORT", "8080")
                .parse()
                .context("BRIDGE_PORT must be a valid port number")?,
        })
    }

    /// Build the `wss://` URL the carrier should stream media to for one call.
    pub fn media_stream_url(&self, call_id: &str) -> String {
        format!("wss://{}/telnyx/media-stream?call_id={call_id}", self.public_url)
    }

    /// Build the webhook URL handed to the carrier at dial time.
    pub fn webhook_url(&self) -> String {
        format!("https://{}/telnyx/webhook", self.public_url)
    }
}
