//! In-memory discovery backend
//!
//! Stands in for the registry in local runs and single-process deployments.
//! Honors the same contract as the HTTP backend, including rejecting
//! operations after close.

use crate::backend::{DiscoveryBackend, DiscoveryConnector};
use crate::error::DiscoveryError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use svcbase_api::{DiscoveryConfig, ServiceRecord};
use tokio::sync::RwLock;
use tracing::debug;

/// Discovery backend backed by a process-local map
#[derive(Default)]
pub struct MemoryDiscoveryBackend {
    records: RwLock<HashMap<String, ServiceRecord>>,
    closed: AtomicBool,
}

impl MemoryDiscoveryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), DiscoveryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DiscoveryError::SessionClosed);
        }
        Ok(())
    }

    /// Number of records currently held.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether a record with the given name is held.
    pub async fn contains(&self, name: &str) -> bool {
        self.records.read().await.contains_key(name)
    }
}

#[async_trait::async_trait]
impl DiscoveryBackend for MemoryDiscoveryBackend {
    async fn publish(&self, record: &ServiceRecord) -> Result<ServiceRecord, DiscoveryError> {
        self.ensure_open()?;
        let mut records = self.records.write().await;
        records.insert(record.name.clone(), record.clone());
        debug!("Memory registry accepted record '{}'", record.name);
        Ok(record.clone())
    }

    async fn unpublish(&self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        self.ensure_open()?;
        let mut records = self.records.write().await;
        match records.remove(&record.name) {
            Some(_) => {
                debug!("Memory registry removed record '{}'", record.name);
                Ok(())
            }
            None => Err(DiscoveryError::NotFound(record.name.clone())),
        }
    }

    async fn close(&self) -> Result<(), DiscoveryError> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Memory discovery backend closed");
        Ok(())
    }
}

/// Connector handing out a shared in-memory backend
#[derive(Clone, Default)]
pub struct MemoryConnector {
    backend: Arc<MemoryDiscoveryBackend>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing store, for inspection.
    pub fn backend(&self) -> Arc<MemoryDiscoveryBackend> {
        self.backend.clone()
    }
}

#[async_trait::async_trait]
impl DiscoveryConnector for MemoryConnector {
    async fn connect(
        &self,
        _settings: &DiscoveryConfig,
    ) -> Result<Arc<dyn DiscoveryBackend>, DiscoveryError> {
        Ok(self.backend.clone())
    }
}
