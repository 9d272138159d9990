//! Backend traits and the session handle owned by the lifecycle orchestrator

use crate::error::DiscoveryError;
use std::sync::Arc;
use svcbase_api::{DiscoveryConfig, ServiceRecord};
use tracing::debug;
use uuid::Uuid;

/// Boundary to the external discovery registry.
///
/// Implementations must support concurrent outstanding requests; the
/// lifecycle orchestrator fans out unpublish calls during shutdown.
#[async_trait::async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// Publish a record; returns the accepted record, which may carry
    /// backend-assigned fields.
    async fn publish(&self, record: &ServiceRecord) -> Result<ServiceRecord, DiscoveryError>;

    /// Remove a previously published record.
    async fn unpublish(&self, record: &ServiceRecord) -> Result<(), DiscoveryError>;

    /// Release the backend connection.
    async fn close(&self) -> Result<(), DiscoveryError>;
}

/// Factory establishing a backend connection from discovery settings.
///
/// Injected into the lifecycle orchestrator so tests and local runs can
/// substitute the registry.
#[async_trait::async_trait]
pub trait DiscoveryConnector: Send + Sync {
    async fn connect(
        &self,
        settings: &DiscoveryConfig,
    ) -> Result<Arc<dyn DiscoveryBackend>, DiscoveryError>;
}

/// Opaque handle to a live registry connection.
///
/// Owned exclusively by one lifecycle instance; closed exactly once during
/// shutdown.
pub struct DiscoverySession {
    id: Uuid,
    backend: Arc<dyn DiscoveryBackend>,
}

impl DiscoverySession {
    pub fn new(backend: Arc<dyn DiscoveryBackend>) -> Self {
        let id = Uuid::new_v4();
        debug!("Opened discovery session {}", id);
        Self { id, backend }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Shared handle to the underlying backend, for requests issued outside
    /// the session lock.
    pub fn backend(&self) -> Arc<dyn DiscoveryBackend> {
        self.backend.clone()
    }

    pub async fn publish(&self, record: &ServiceRecord) -> Result<ServiceRecord, DiscoveryError> {
        self.backend.publish(record).await
    }

    pub async fn unpublish(&self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        self.backend.unpublish(record).await
    }

    /// Close the underlying connection. Consumes the session so a closed
    /// handle cannot be reused.
    pub async fn close(self) -> Result<(), DiscoveryError> {
        debug!("Closing discovery session {}", self.id);
        self.backend.close().await
    }
}
