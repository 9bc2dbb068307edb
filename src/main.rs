//! Audio bridge process entrypoint: load configuration, construct the
//! engine's collaborators, and serve the ingress surface.

use std::sync::Arc;

use anyhow::Result;
use audio_bridge::callback::CallbackClient;
use audio_bridge::carrier::client::CarrierClient;
use audio_bridge::config::Config;
use audio_bridge::registry::CallRegistry;
use audio_bridge::server;
use audio_bridge::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Arc::new(Config::load()?);
    let http = reqwest::Client::new();
    let registry = Arc::new(CallRegistry::new());
    let carrier = CarrierClient::new(config.carrier.clone())?;
    let callback = CallbackClient::new(http.clone(), config.bridge_secret.clone());

    let engine = Engine::new(config.clone(), registry, carrier, callback, http);

    server::serve(config, engine).await
}
