//! Named interfaces to the collaborators the engine calls but does not own:
//! briefing moderation and post-call summary generation (§1 "out of
//! scope... treated as external collaborators with named interfaces only").
//!
//! Grounded on `examples/original_source/bridge/gemini_bridge.py::generate_summary`
//! (summary prompt and fallback text) and `main.py`'s moderation call site
//! (`moderate_briefing` gates `/start-call` with a 422 on rejection); both
//! are implemented here as one-shot REST calls against the voice-AI's
//! `generateContent` endpoint, following the same pooled-`reqwest::Client`,
//! bearer-free query-key style as `voiceai::session`'s WebSocket connect URL.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::config::VoiceAiConfig;
use crate::engine::state::TranscriptEntry;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

async fn generate_text(http: &Client, config: &VoiceAiConfig, model: &str, prompt: &str) -> Result<String> {
    let url = format!(
        "{}/models/{model}:generateContent?key={}",
        config.rest_base, config.api_key
    );
    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    });

    let resp = http
        .post(url)
        .json(&body)
        .send()
        .await
        .context("generateContent request failed")?
        .error_for_status()
        .context("generateContent returned an error status")?;

    let parsed: GenerateContentResponse = resp.json().await.context("invalid generateContent response body")?;
    let text = parsed
        .candidates
        .into_iter()
        .find_map(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .unwrap_or_default();
    Ok(text)
}

/// Check a briefing against content policy before dialing. Returns
/// `Some(reason)` if the briefing should be rejected (422 at ingress),
/// `None` if it is allowed. A moderation-call failure is treated as
/// allow-through by the caller (§7: moderation failures fail open per the
/// reference's `except Exception: logger.error(...)` behavior).
pub async fn moderate_briefing(http: &Client, config: &VoiceAiConfig, briefing: &str) -> Result<Option<String>> {
    let prompt = format!(
        "You are a content-safety filter for an outbound phone-call agent. \
         Reply with exactly the word PASS if the following task briefing is \
         safe to carry out, or a short one-sentence reason it must be \
         rejected (spam, harassment, fraud, illegal activity, or impersonation \
         of a real entity without consent) otherwise.\n\nBriefing:\n{briefing}"
    );
    let verdict = generate_text(http, config, &config.summary_model, &prompt).await?;
    let trimmed = verdict.trim();
    if trimmed.eq_ignore_ascii_case("pass") || trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Summarize a completed call's transcript (§4.6.9 step 7). Callers
/// substitute a fixed apology string on error rather than propagating it.
pub async fn generate_summary(http: &Client, config: &VoiceAiConfig, transcript: &[TranscriptEntry]) -> Result<String> {
    if transcript.is_empty() {
        return Ok("No conversation was recorded.".to_string());
    }

    let transcript_text = transcript
        .iter()
        .map(|entry| {
            let speaker = match entry.speaker {
                crate::engine::state::TranscriptSpeaker::Agent => "AI Agent",
                crate::engine::state::TranscriptSpeaker::Callee => "Callee",
            };
            format!("{speaker}: {}", entry.text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Summarize this phone call transcript concisely. Focus on outcomes, \
         decisions made, and any action items or follow-ups. Keep it to 2-3 \
         sentences.\n\nTranscript:\n{transcript_text}"
    );

    let summary = generate_text(http, config, &config.summary_model, &prompt).await?;
    if summary.trim().is_empty() {
        Ok("Call completed.".to_string())
    } else {
        Ok(summary)
    }
}

/// Fixed apology substituted when summary generation errors (§7, §4.6.9).
pub const SUMMARY_FALLBACK: &str = "Call completed but summary generation failed.";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn empty_transcript_short_circuits_without_calling_out() {
        // generate_summary's empty-transcript branch never reaches generate_text,
        // so this can run without network access.
        let transcript: Vec<TranscriptEntry> = Vec::new();
        let result = generate_summary(
            &Client::new(),
            &VoiceAiConfig {
                api_key: String::new(),
                live_ws_url: String::new(),
                rest_base: String::new(),
                live_model: String::new(),
                summary_model: String::new(),
                voice: String::new(),
            },
            &transcript,
        )
        .await;
        assert_eq!(result.unwrap(), "No conversation was recorded.");
    }

    #[test]
    fn transcript_entries_format_with_speaker_labels() {
        let entries = vec![TranscriptEntry {
            speaker: crate::engine::state::TranscriptSpeaker::Callee,
            text: "Sounds good".to_string(),
            timestamp: Utc::now(),
        }];
        assert_eq!(entries[0].text, "Sounds good");
    }
}
