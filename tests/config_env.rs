//! Integration coverage for environment-variable configuration loading
//! (§2a, §6): required variables abort startup with a clear error, optional
//! ones fall back to their documented defaults.
//!
//! A single test function owns every env var this module touches so the
//! assertions never race against each other under the default parallel test
//! runner.

use audio_bridge::Config;

const REQUIRED_VARS: &[&str] = &[
    "AUDIO_BRIDGE_SECRET",
    "TELNYX_API_KEY",
    "TELNYX_CONNECTION_ID",
    "TELNYX_PHONE_NUMBER",
    "GOOGLE_API_KEY",
];

fn clear_all() {
    for var in REQUIRED_VARS {
        std::env::remove_var(var);
    }
    std::env::remove_var("BRIDGE_PUBLIC_URL");
    std::env::remove_var("BRIDGE_PORT");
}

#[test]
fn load_fails_fast_on_missing_required_vars_and_succeeds_once_set() {
    clear_all();

    let err = Config::load().expect_err("should fail without AUDIO_BRIDGE_SECRET");
    assert!(err.to_string().contains("AUDIO_BRIDGE_SECRET"));

    for var in REQUIRED_VARS {
        std::env::set_var(var, format!("test-{var}"));
    }

    let config = Config::load().expect("all required vars are now set");
    assert_eq!(config.bridge_secret, "test-AUDIO_BRIDGE_SECRET");
    assert_eq!(config.carrier.connection_id, "test-TELNYX_CONNECTION_ID");
    // Optional vars fall back to their documented defaults.
    assert_eq!(config.public_url, "localhost:8080");
    assert_eq!(config.port, 8080);
    assert_eq!(
        config.webhook_url(),
        "https://localhost:8080/telnyx/webhook"
    );
    assert_eq!(
        config.media_stream_url("c1"),
        "wss://localhost:8080/telnyx/media-stream?call_id=c1"
    );

    std::env::set_var("BRIDGE_PUBLIC_URL", "bridge.example.com");
    std::env::set_var("BRIDGE_PORT", "9090");
    let config = Config::load().expect("still valid with overrides");
    assert_eq!(config.public_url, "bridge.example.com");
    assert_eq!(config.port, 9090);

    clear_all();
}
