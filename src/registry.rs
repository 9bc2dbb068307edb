//! Process-wide registry of in-flight calls, keyed by both the bridge's own
//! call id and the carrier's call-control id (§4.5).
//!
//! Grounded on `examples/original_source/bridge/call_manager.py`'s
//! module-level `active_calls` dict and `find_call_by_telnyx_id` helper; the
//! `RwLock<HashMap<..>>` shape follows the teacher's
//! `server/device.rs::DeviceRegistry`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::engine::state::CallRecord;

/// A registered call, reachable under lock for the lifetime of the record.
pub type SharedCall = Arc<Mutex<CallRecord>>;

/// Holds every call currently known to the bridge. Calls are removed on
/// completion (§4.5's "idempotent by removal" cleanup rule) — the registry
/// never accumulates terminal entries.
#[derive(Default)]
pub struct CallRegistry {
    by_call_id: RwLock<HashMap<String, SharedCall>>,
    by_carrier_id: RwLock<HashMap<String, String>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly created call under its own id.
    pub async fn insert(&self, call_id: String, record: CallRecord) -> SharedCall {
        let shared = Arc::new(Mutex::new(record));
        self.by_call_id.write().await.insert(call_id, shared.clone());
        shared
    }

    /// Record the carrier's call-control id once the carrier assigns one,
    /// so webhook/media events addressed by that id can find the call.
    pub async fn bind_carrier_id(&self, call_id: &str, carrier_call_id: String) {
        self.by_carrier_id.write().await.insert(carrier_call_id, call_id.to_string());
    }

    pub async fn get(&self, call_id: &str) -> Option<SharedCall> {
        self.by_call_id.read().await.get(call_id).cloned()
    }

    pub async fn get_by_carrier_id(&self, carrier_call_id: &str) -> Option<SharedCall> {
        let call_id = self.by_carrier_id.read().await.get(carrier_call_id).cloned()?;
        self.get(&call_id).await
    }

    /// Remove a call from both indices. Safe to call more than once for the
    /// same id — later calls are a no-op.
    pub async fn remove(&self, call_id: &str) {
        self.by_call_id.write().await.remove(call_id);
        self.by_carrier_id.write().await.retain(|_, v| v != call_id);
    }

    pub async fn len(&self) -> usize {
        self.by_call_id.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{CallRecord, CallStatus};

    fn sample_record() -> CallRecord {
        CallRecord::new(
            "call-1".to_string(),
            "+15005550006".to_string(),
            "Say hello".to_string(),
            "English".to_string(),
            "Sam".to_string(),
            None,
        )
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let registry = CallRegistry::new();
        registry.insert("call-1".to_string(), sample_record()).await;
        let found = registry.get("call-1").await;
        assert!(found.is_some());
        assert_eq!(found.unwrap().lock().await.status, CallStatus::Pending);
    }

    #[tokio::test]
    async fn carrier_id_lookup_resolves_to_same_record() {
        let registry = CallRegistry::new();
        registry.insert("call-1".to_string(), sample_record()).await;
        registry.bind_carrier_id("call-1", "carrier-abc".to_string()).await;

        let found = registry.get_by_carrier_id("carrier-abc").await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_clears_both_indices() {
        let registry = CallRegistry::new();
        registry.insert("call-1".to_string(), sample_record()).await;
        registry.bind_carrier_id("call-1", "carrier-abc".to_string()).await;

        registry.remove("call-1").await;
        registry.remove("call-1").await;

        assert!(registry.get("call-1").await.is_none());
        assert!(registry.get_by_carrier_id("carrier-abc").await.is_none());
        assert_eq!(registry.len().await, 0);
    }
}
