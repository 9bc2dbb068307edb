//! REST client for the carrier's call-control API: place an outbound call,
//! start bidirectional media streaming on an answered call, and hang up.
//!
//! Grounded on `examples/original_source/bridge/telnyx_handler.py::initiate_call`
//! and the `start_streaming`/`hangup_call` calls referenced from
//! `call_manager.py`; request/response shape (single pooled client, bearer
//! header, JSON body, `Context`-wrapped errors) follows the teacher's
//! `agent/llm.rs::OpenRouterClient`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Credentials and defaults needed to dial through the carrier.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub api_base: String,
    pub api_key: String,
    pub connection_id: String,
    pub from_number: String,
}

/// Thin REST client over the carrier's call-control API.
#[derive(Clone)]
pub struct CarrierClient {
    http: Client,
    config: CarrierConfig,
}

#[derive(Debug, Deserialize)]
struct DialResponseEnvelope {
    data: DialResponseData,
}

#[derive(Debug, Deserialize)]
struct DialResponseData {
    call_control_id: String,
}

impl CarrierClient {
    pub fn new(config: CarrierConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build carrier HTTP client")?;
        Ok(Self { http, config })
    }

    /// Place an outbound call. Streaming is deliberately *not* configured
    /// here — it starts only once the call is answered (§4.6.3), so ringback
    /// is never captured as call audio.
    pub async fn dial(&self, to: &str, webhook_url: &str) -> Result<String> {
        let body = serde_json::json!({
            "connection_id": self.config.connection_id,
            "to": to,
            "from": self.config.from_number,
            "webhook_url": webhook_url,
        });

        let resp = self
            .http
            .post(format!("{}/calls", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("dial request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("dial failed: {status} {text}");
        }

        let envelope: DialResponseEnvelope = resp.json().await.context("invalid dial response body")?;
        Ok(envelope.data.call_control_id)
    }

    /// Start inbound+bidirectional media streaming on a live, answered call.
    /// Always L16, at the carrier's default sample rate.
    pub async fn start_streaming(&self, carrier_call_id: &str, stream_url: &str) -> Result<()> {
        let body = serde_json::json!({
            "stream_url": stream_url,
            "stream_track": "both_tracks",
            "stream_bidirectional_mode": "rtp",
            "stream_bidirectional_codec": "L16",
        });

        let resp = self
            .http
            .post(format!(
                "{}/calls/{carrier_call_id}/actions/streaming_start",
                self.config.api_base
            ))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("start_streaming request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("start_streaming failed: {status} {text}");
        }
        Ok(())
    }

    /// Terminate a call.
    pub async fn hangup(&self, carrier_call_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/calls/{carrier_call_id}/actions/hangup", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("hangup request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("hangup failed: {status} {text}");
        }
        Ok(())
    }
}
