//! WebSocket session against the cloud voice-AI service: system-prompt and
//! VAD configuration, realtime audio in, transcript/audio events out.
//!
//! Grounded on `examples/original_source/bridge/gemini_bridge.py`
//! (`build_system_prompt`, `create_gemini_config`) and `call_manager.py`'s
//! `_gemini_reader` pump; the writer/reader task-pair and `mpsc`-fed sender
//! loop follow the teacher's `messaging/slack.rs::socket_mode::start_socket_mode`.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const OUTBOUND_QUEUE_DEPTH: usize = 64;
const INBOUND_QUEUE_DEPTH: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the session needs to open and brief itself, assembled once per
/// call from the call record and process config (§4.6.1).
#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    pub ws_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub briefing: String,
    pub user_name: String,
    pub language: String,
    pub sample_rate_hz: u32,
}

/// Events the voice-AI session can emit, consumed by the reader pump
/// (`engine::reader`) and translated back into carrier media frames.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// A chunk of synthesized agent audio, little-endian 16-bit PCM.
    AudioChunk(Vec<u8>),
    /// A streaming transcript fragment for one speaker.
    Transcript { speaker: Speaker, text: String },
    /// The model finished its turn — flush any buffered transcript.
    TurnComplete,
    /// The model's turn was interrupted by caller speech (barge-in).
    Interrupted,
    /// The session closed, cleanly or otherwise.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Agent,
    Callee,
}

enum OutboundFrame {
    Audio(Vec<u8>),
    Text(String),
    Close,
}

/// The send half of a live voice-AI session: enqueue audio/text and, at call
/// completion, close the connection. Cheap to store in the call record and
/// to share with the phone→AI pump (the pump only ever needs to write).
pub struct VoiceSessionHandle {
    outbound_tx: mpsc::Sender<OutboundFrame>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

/// The receive half: owned exclusively by the persistent AI→phone reader
/// task (§4.6.6), never stored in the call record.
pub type VoiceEventReceiver = mpsc::Receiver<VoiceEvent>;

/// A cheap, cloneable handle to just the audio-input side of a session.
/// Lets the phone→AI pump (§4.6.5) enqueue audio without holding the call
/// record's lock across the send's await point.
#[derive(Clone)]
pub struct AudioInputSender(mpsc::Sender<OutboundFrame>);

impl AudioInputSender {
    pub async fn send(&self, pcm: Vec<u8>) -> Result<()> {
        self.0
            .send(OutboundFrame::Audio(pcm))
            .await
            .context("voice-AI session writer has closed")
    }
}

impl VoiceSessionHandle {
    /// Connect, send the setup/system-prompt message, and spawn the
    /// writer/reader task pair. Returns the send handle plus the event
    /// stream, split so the engine can give each half to the component
    /// that actually needs it.
    pub async fn open(config: VoiceSessionConfig) -> Result<(Self, VoiceEventReceiver)> {
        let url = format!("{}?key={}", config.ws_url, config.api_key);
        let (ws_stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(&url))
            .await
            .context("timed out connecting to voice-AI session")?
            .context("failed to connect to voice-AI session")?;

        let (mut write, mut read) = ws_stream.split();

        let setup = ClientFrame::Setup(SetupPayload {
            model: config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_name: config.voice.clone(),
                },
            },
            system_instruction: build_system_prompt(&config.briefing, &config.user_name, &config.language),
            realtime_input_config: RealtimeInputConfig {
                automatic_activity_detection: AutomaticActivityDetection {
                    disabled: false,
                    start_of_speech_sensitivity: "START_SENSITIVITY_HIGH".to_string(),
                    end_of_speech_sensitivity: "END_SENSITIVITY_HIGH".to_string(),
                    prefix_padding_ms: 20,
                    silence_duration_ms: 500,
                },
            },
            input_audio_transcription: Some(serde_json::json!({})),
            output_audio_transcription: Some(serde_json::json!({})),
        });
        write
            .send(WsMessage::Text(
                serde_json::to_string(&setup).context("failed to encode setup frame")?.into(),
            ))
            .await
            .context("failed to send setup frame")?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_QUEUE_DEPTH);
        let (inbound_tx, inbound_rx) = mpsc::channel::<VoiceEvent>(INBOUND_QUEUE_DEPTH);

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let sent = match frame {
                    OutboundFrame::Audio(pcm) => {
                        let payload = ClientFrame::RealtimeInput(RealtimeInputPayload {
                            media_chunks: vec![MediaChunk {
                                mime_type: "audio/pcm;rate=16000".to_string(),
                                data: BASE64.encode(pcm),
                            }],
                        });
                        serde_json::to_string(&payload).ok()
                    }
                    OutboundFrame::Text(text) => {
                        let payload = ClientFrame::ClientContent(ClientContentPayload {
                            turns: vec![Turn {
                                role: "user".to_string(),
                                parts: vec![TextPart { text }],
                            }],
                            turn_complete: true,
                        });
                        serde_json::to_string(&payload).ok()
                    }
                    OutboundFrame::Close => break,
                };
                let Some(text) = sent else { continue };
                if write.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader_task = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };
                let text = match msg {
                    WsMessage::Text(t) => t.to_string(),
                    WsMessage::Close(_) => break,
                    _ => continue,
                };
                let Ok(frame) = serde_json::from_str::<ServerFrame>(&text) else {
                    continue;
                };
                for event in frame.into_events() {
                    if inbound_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            let _ = inbound_tx.send(VoiceEvent::Closed).await;
        });

        let handle = Self {
            outbound_tx,
            writer_task,
            reader_task,
        };
        Ok((handle, inbound_rx))
    }

    /// A cloneable handle to just the audio-input side, for callers that
    /// need to hold it across an await without borrowing the whole session.
    pub fn audio_sender(&self) -> AudioInputSender {
        AudioInputSender(self.outbound_tx.clone())
    }

    /// Inject a text turn (used once at session open so the agent speaks
    /// first, and for any later out-of-band nudge).
    pub async fn send_text_turn(&self, text: String) -> Result<()> {
        self.outbound_tx
            .send(OutboundFrame::Text(text))
            .await
            .context("voice-AI session writer has closed")
    }

    /// Close the session and wait for both tasks to finish.
    pub async fn close(self) -> Result<()> {
        let _ = self.outbound_tx.send(OutboundFrame::Close).await;
        let _ = self.writer_task.await;
        self.reader_task.abort();
        Ok(())
    }
}

/// Build the system prompt handed to the model at setup time: the briefing
/// wrapped in fixed instructional scaffolding (identity, flow, rules)
/// parameterized by `user_name` and `language` (§4.4). `language == "auto"`
/// asks the model to mirror whatever language the callee speaks instead of
/// naming one.
pub fn build_system_prompt(briefing: &str, user_name: &str, language: &str) -> String {
    let lang_instruction = if language == "auto" {
        "Speak in the language that the person on the other end uses.".to_string()
    } else {
        format!("Speak in {language}.")
    };

    format!(
        "You are a phone agent making a call on behalf of a user. Your job is \
         to accomplish the task described below.\n\n\
         TASK:\n{briefing}\n\n\
         RULES:\n\
         - If you accomplish the task, confirm the details and politely end the call.\n\
         - If the person on the other end asks who you are, say you are calling on behalf of {user_name}.\n\
         - If you cannot accomplish the task, gather as much useful information as possible.\n\
         - {lang_instruction}\n\
         - Keep the call under 5 minutes. If it's going longer, wrap up politely."
    )
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ClientFrame {
    #[serde(rename = "setup")]
    Setup(SetupPayload),
    #[serde(rename = "realtimeInput")]
    RealtimeInput(RealtimeInputPayload),
    #[serde(rename = "clientContent")]
    ClientContent(ClientContentPayload),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupPayload {
    model: String,
    generation_config: GenerationConfig,
    system_instruction: String,
    realtime_input_config: RealtimeInputConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_transcription: Option<serde_json::Value>,
}

/// Server-side voice-activity detection, configured per-session (§4.4).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputConfig {
    automatic_activity_detection: AutomaticActivityDetection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutomaticActivityDetection {
    disabled: bool,
    start_of_speech_sensitivity: String,
    end_of_speech_sensitivity: String,
    prefix_padding_ms: u32,
    silence_duration_ms: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputPayload {
    media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaChunk {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContentPayload {
    turns: Vec<Turn>,
    turn_complete: bool,
}

#[derive(Debug, Serialize)]
struct Turn {
    role: String,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerFrame {
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    input_transcription: Option<TranscriptionChunk>,
    #[serde(default)]
    output_transcription: Option<TranscriptionChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<InlinePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlinePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionChunk {
    #[serde(default)]
    text: String,
}

impl ServerFrame {
    fn into_events(self) -> Vec<VoiceEvent> {
        let mut events = Vec::new();

        if let Some(chunk) = self.output_transcription {
            if !chunk.text.is_empty() {
                events.push(VoiceEvent::Transcript {
                    speaker: Speaker::Agent,
                    text: chunk.text,
                });
            }
        }
        if let Some(chunk) = self.input_transcription {
            if !chunk.text.is_empty() {
                events.push(VoiceEvent::Transcript {
                    speaker: Speaker::Callee,
                    text: chunk.text,
                });
            }
        }

        if let Some(content) = self.server_content {
            if content.interrupted {
                events.push(VoiceEvent::Interrupted);
            }
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(inline) = part.inline_data {
                        if let Ok(audio) = BASE64.decode(inline.data) {
                            events.push(VoiceEvent::AudioChunk(audio));
                        }
                    }
                }
            }
            if content.turn_complete {
                events.push(VoiceEvent::TurnComplete);
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_includes_user_name_language_and_briefing() {
        let prompt = build_system_prompt("Confirm the appointment for Tuesday.", "Sam", "English");
        assert!(prompt.contains("on behalf of Sam"));
        assert!(prompt.contains("Speak in English."));
        assert!(prompt.contains("Confirm the appointment for Tuesday."));
    }

    #[test]
    fn system_prompt_mirrors_callee_language_when_auto() {
        let prompt = build_system_prompt("Take a message.", "Sam", "auto");
        assert!(prompt.contains("Speak in the language that the person on the other end uses."));
        assert!(!prompt.contains("Speak in auto."));
    }

    #[test]
    fn server_frame_with_audio_and_turn_complete_emits_both_events() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "serverContent": {
                "modelTurn": { "parts": [{"inlineData": {"data": BASE64.encode(b"abc")}}] },
                "turnComplete": true,
                "interrupted": false
            }
        }))
        .unwrap();
        let events = frame.into_events();
        assert!(events.contains(&VoiceEvent::AudioChunk(b"abc".to_vec())));
        assert!(events.contains(&VoiceEvent::TurnComplete));
    }

    #[test]
    fn server_frame_interrupted_emits_interrupted_event() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "serverContent": { "interrupted": true, "turnComplete": false }
        }))
        .unwrap();
        assert_eq!(frame.into_events(), vec![VoiceEvent::Interrupted]);
    }

    #[test]
    fn transcription_chunks_map_to_correct_speaker() {
        let frame: ServerFrame = serde_json::from_value(serde_json::json!({
            "inputTranscription": { "text": "hello from caller" },
            "outputTranscription": { "text": "hello from agent" }
        }))
        .unwrap();
        let events = frame.into_events();
        assert!(events.contains(&VoiceEvent::Transcript {
            speaker: Speaker::Agent,
            text: "hello from agent".to_string()
        }));
        assert!(events.contains(&VoiceEvent::Transcript {
            speaker: Speaker::Callee,
            text: "hello from caller".to_string()
        }));
    }
}
