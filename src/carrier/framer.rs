//! Parses and serializes the carrier's JSON-over-WebSocket media-stream
//! frames: `start` (format announcement), `media` (base64 audio payload),
//! `stop` (end of stream).
//!
//! Grounded on `examples/original_source/bridge/telnyx_handler.py`'s
//! `TelnyxMediaHandler` for message shape and on the `start` frame accessed
//! as `message.get("start", {}).get("mediaFormat", {})` through
//! `call_manager.py`'s `extract_media_format` call site.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// Wire encoding announced by the carrier's `start` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// G.711 µ-law.
    #[serde(rename = "PCMU")]
    Pcmu,
    /// Linear 16-bit PCM.
    #[serde(rename = "L16")]
    L16,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::L16
    }
}

/// Media format announced by the carrier, defaulting to L16 @ 16 kHz when
/// the `start` frame omits it (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Whether 16-bit samples on this stream are big-endian. Driven by the
    /// `start` frame (or an explicit override) rather than hardcoded, per
    /// SPEC_FULL.md §9's "byte-order-agnostic" decision.
    #[serde(default)]
    pub big_endian: bool,
}

fn default_sample_rate() -> u32 {
    16000
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            encoding: Encoding::L16,
            sample_rate: default_sample_rate(),
            big_endian: false,
        }
    }
}

/// A decoded carrier media-stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CarrierFrame {
    Start(StreamFormat),
    Media(Option<Vec<u8>>),
    Stop,
    /// Any other `event` value — ignored by the engine.
    Other,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    start: Option<RawStart>,
    #[serde(default)]
    media: Option<RawMedia>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStart {
    #[serde(default, rename = "mediaFormat")]
    media_format: Option<RawMediaFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMediaFormat {
    #[serde(default)]
    encoding: Option<Encoding>,
    #[serde(default, rename = "sampleRate")]
    sample_rate: Option<u32>,
    #[serde(default, rename = "bigEndian")]
    big_endian: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    payload: Option<String>,
}

/// Parse a raw WebSocket text frame from the carrier.
pub fn parse_frame(raw: &str) -> Result<CarrierFrame> {
    let frame: RawFrame = serde_json::from_str(raw).context("invalid carrier media-stream frame")?;
    Ok(match frame.event.as_str() {
        "start" => {
            let fmt = frame
                .start
                .and_then(|s| s.media_format)
                .map(|mf| StreamFormat {
                    encoding: mf.encoding.unwrap_or_default(),
                    sample_rate: mf.sample_rate.unwrap_or_else(default_sample_rate),
                    big_endian: mf.big_endian.unwrap_or(false),
                })
                .unwrap_or_default();
            CarrierFrame::Start(fmt)
        }
        "media" => {
            let audio = frame
                .media
                .and_then(|m| m.payload)
                .map(|payload| BASE64.decode(payload).context("invalid base64 media payload"))
                .transpose()?;
            CarrierFrame::Media(audio)
        }
        "stop" => CarrierFrame::Stop,
        _ => CarrierFrame::Other,
    })
}

/// Serialize outbound audio as a carrier media frame:
/// `{"event":"media","media":{"payload":"<base64>"}}`.
pub fn format_audio_message(audio: &[u8]) -> String {
    let payload = BASE64.encode(audio);
    serde_json::json!({
        "event": "media",
        "media": { "payload": payload },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_frame_with_explicit_format() {
        let raw = r#"{"event":"start","start":{"mediaFormat":{"encoding":"PCMU","sampleRate":8000}}}"#;
        let frame = parse_frame(raw).unwrap();
        assert_eq!(
            frame,
            CarrierFrame::Start(StreamFormat {
                encoding: Encoding::Pcmu,
                sample_rate: 8000,
                big_endian: false,
            })
        );
    }

    #[test]
    fn start_frame_defaults_to_l16_16khz_when_format_absent() {
        let raw = r#"{"event":"start"}"#;
        let frame = parse_frame(raw).unwrap();
        assert_eq!(frame, CarrierFrame::Start(StreamFormat::default()));
    }

    #[test]
    fn parses_media_frame_payload() {
        let payload = BASE64.encode(b"hello");
        let raw = format!(r#"{{"event":"media","media":{{"payload":"{payload}"}}}}"#);
        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame, CarrierFrame::Media(Some(b"hello".to_vec())));
    }

    #[test]
    fn media_frame_without_payload_is_none() {
        let raw = r#"{"event":"media","media":{}}"#;
        let frame = parse_frame(raw).unwrap();
        assert_eq!(frame, CarrierFrame::Media(None));
    }

    #[test]
    fn parses_stop_frame() {
        assert_eq!(parse_frame(r#"{"event":"stop"}"#).unwrap(), CarrierFrame::Stop);
    }

    #[test]
    fn unknown_event_is_ignored() {
        assert_eq!(parse_frame(r#"{"event":"mark"}"#).unwrap(), CarrierFrame::Other);
    }

    #[test]
    fn format_audio_message_round_trips_through_parse() {
        let msg = format_audio_message(b"abc123");
        let frame = parse_frame(&msg).unwrap();
        assert_eq!(frame, CarrierFrame::Media(Some(b"abc123".to_vec())));
    }
}
