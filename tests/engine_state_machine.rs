//! Integration coverage for the call record's state machine and registry
//! wiring, end to end through the public crate API (§4.6.1, §4.5, §8).

use audio_bridge::registry::CallRegistry;
use audio_bridge::{CallRecord, CallStatus};

fn sample_record(call_id: &str) -> CallRecord {
    CallRecord::new(
        call_id.to_string(),
        "+15005550006".to_string(),
        "Confirm the dentist appointment for Thursday".to_string(),
        "English".to_string(),
        "Priya".to_string(),
        Some("https://orchestrator.example/callback".to_string()),
    )
}

#[tokio::test]
async fn new_call_is_reachable_by_both_ids_and_starts_pending() {
    let registry = CallRegistry::new();
    let shared = registry.insert("c1".to_string(), sample_record("c1")).await;
    registry.bind_carrier_id("c1", "carrier-xyz".to_string()).await;

    {
        let record = shared.lock().await;
        assert_eq!(record.status, CallStatus::Pending);
        assert!(record.transcript.is_empty());
        assert!(record.carrier_call_id.is_none()); // bound separately in the registry index, not on the record itself
    }

    let by_call_id = registry.get("c1").await.expect("found by call_id");
    let by_carrier_id = registry.get_by_carrier_id("carrier-xyz").await.expect("found by carrier id");
    assert!(std::sync::Arc::ptr_eq(&by_call_id, &by_carrier_id));
}

#[tokio::test]
async fn terminal_status_is_sticky_once_reached() {
    let registry = CallRegistry::new();
    let shared = registry.insert("c2".to_string(), sample_record("c2")).await;

    {
        let mut record = shared.lock().await;
        assert!(record.transition_to(CallStatus::Dialing));
        assert!(record.transition_to(CallStatus::Connected));
        assert!(record.transition_to(CallStatus::Completed));
        // Once terminal, further transitions (even a late hangup-triggered one) are rejected.
        assert!(!record.transition_to(CallStatus::Failed));
        assert_eq!(record.status, CallStatus::Completed);
    }
}

#[tokio::test]
async fn removal_is_idempotent_and_clears_both_registry_indices() {
    let registry = CallRegistry::new();
    registry.insert("c3".to_string(), sample_record("c3")).await;
    registry.bind_carrier_id("c3", "carrier-abc".to_string()).await;

    registry.remove("c3").await;
    registry.remove("c3").await; // a second hangup webhook for the same call is a no-op

    assert!(registry.get("c3").await.is_none());
    assert!(registry.get_by_carrier_id("carrier-abc").await.is_none());
    assert_eq!(registry.len().await, 0);
}

#[tokio::test]
async fn answered_signal_is_observable_through_a_cloned_watch_receiver() {
    let registry = CallRegistry::new();
    let shared = registry.insert("c4".to_string(), sample_record("c4")).await;

    let mut answered_rx = {
        let record = shared.lock().await;
        record.answered_rx.clone()
    };
    assert!(!*answered_rx.borrow());

    {
        let mut record = shared.lock().await;
        record.signal_answered();
    }

    answered_rx.changed().await.expect("sender still alive");
    assert!(*answered_rx.borrow());
}
