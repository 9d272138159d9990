//! Registration ledger: what this process instance currently has published

use std::collections::HashMap;
use std::sync::Arc;
use svcbase_api::ServiceRecord;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory set of currently-published service records, keyed by record
/// name.
///
/// A record is a member iff its publish succeeded and no unpublish has
/// succeeded since. Safe for concurrent use; snapshots are point-in-time
/// copies.
#[derive(Clone)]
pub struct RegistrationLedger {
    records: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl RegistrationLedger {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a record; no-op if a record with the same name is already present
    /// (set semantics). Returns whether the record was newly added.
    pub async fn record(&self, entry: ServiceRecord) -> bool {
        let mut records = self.records.write().await;
        if records.contains_key(&entry.name) {
            return false;
        }
        debug!("Ledger recorded '{}'", entry.name);
        records.insert(entry.name.clone(), entry);
        true
    }

    /// Remove the record with the given name; no-op if absent.
    pub async fn remove(&self, name: &str) -> Option<ServiceRecord> {
        let removed = self.records.write().await.remove(name);
        if removed.is_some() {
            debug!("Ledger removed '{}'", name);
        }
        removed
    }

    /// Point-in-time copy of the current members.
    pub async fn snapshot(&self) -> Vec<ServiceRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.records.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for RegistrationLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_semantics() {
        let ledger = RegistrationLedger::new();
        let record = ServiceRecord::http_endpoint("svc-a", "localhost", 8080);

        assert!(ledger.record(record.clone()).await);
        assert!(!ledger.record(record.clone()).await);
        assert_eq!(ledger.len().await, 1);

        assert!(ledger.remove("svc-a").await.is_some());
        assert!(ledger.remove("svc-a").await.is_none());
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time() {
        let ledger = RegistrationLedger::new();
        ledger
            .record(ServiceRecord::http_endpoint("svc-a", "localhost", 8080))
            .await;

        let snapshot = ledger.snapshot().await;
        ledger
            .record(ServiceRecord::http_endpoint("svc-b", "localhost", 8081))
            .await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_recording() {
        let ledger = RegistrationLedger::new();
        let mut handles = Vec::new();
        for i in 0u16..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record(ServiceRecord::http_endpoint(
                        format!("svc-{}", i),
                        "localhost",
                        8000 + i,
                    ))
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(ledger.len().await, 16);
    }
}
