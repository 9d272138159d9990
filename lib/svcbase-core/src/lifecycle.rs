//! Lifecycle orchestrator: start/stop sequencing for one process instance
//!
//! Each instance owns its own registration ledger, discovery session and
//! circuit breaker; nothing here is a process-wide singleton.

use crate::error::{BaseError, Result};
use crate::ledger::RegistrationLedger;
use std::sync::{Arc, OnceLock};
use svcbase_api::{record::METADATA_API_NAME, BaseConfig, ServiceRecord};
use svcbase_discovery::{
    DiscoveryBackend, DiscoveryConnector, DiscoveryError, DiscoverySession, HttpConnector,
};
use svcbase_resilience::CircuitBreaker;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Owns process start and stop sequencing.
///
/// `start` connects the discovery session and constructs the shared circuit
/// breaker; publish helpers lazily run the same path when invoked first.
/// `stop` deregisters everything in the ledger, waits for all outcomes and
/// closes the session exactly once.
pub struct ServiceLifecycle {
    config: BaseConfig,
    connector: Arc<dyn DiscoveryConnector>,
    session: Mutex<Option<DiscoverySession>>,
    breaker: OnceLock<Arc<CircuitBreaker>>,
    ledger: RegistrationLedger,
}

impl ServiceLifecycle {
    /// Build a lifecycle talking to an HTTP discovery registry.
    pub fn new(config: BaseConfig) -> Self {
        Self::with_connector(config, Arc::new(HttpConnector))
    }

    /// Build a lifecycle with an injected backend connector.
    pub fn with_connector(config: BaseConfig, connector: Arc<dyn DiscoveryConnector>) -> Self {
        Self {
            config,
            connector,
            session: Mutex::new(None),
            breaker: OnceLock::new(),
            ledger: RegistrationLedger::new(),
        }
    }

    pub fn config(&self) -> &BaseConfig {
        &self.config
    }

    pub fn ledger(&self) -> &RegistrationLedger {
        &self.ledger
    }

    /// The process-wide circuit breaker; None until the start path has run.
    pub fn breaker(&self) -> Option<Arc<CircuitBreaker>> {
        self.breaker.get().cloned()
    }

    /// Connect the discovery session and construct the circuit breaker.
    /// No-op if already started.
    pub async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.start_locked(&mut session).await
    }

    async fn start_locked(&self, session: &mut Option<DiscoverySession>) -> Result<()> {
        if session.is_some() {
            debug!("Lifecycle already started");
            return Ok(());
        }

        let backend = self
            .connector
            .connect(&self.config.discovery)
            .await
            .map_err(|e| match e {
                DiscoveryError::InvalidSettings(msg) => BaseError::Configuration(msg),
                other => BaseError::BackendUnavailable(other),
            })?;

        self.breaker
            .get_or_init(|| Arc::new(CircuitBreaker::from_config(&self.config.circuit_breaker)));

        let handle = DiscoverySession::new(backend);
        info!("Discovery session {} established", handle.id());
        *session = Some(handle);
        Ok(())
    }

    /// Run the start path if no session exists yet, then hand out the
    /// backend. The session lock guards against concurrent publishers
    /// double-initializing.
    async fn ensure_session(&self) -> Result<Arc<dyn DiscoveryBackend>> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            debug!("No discovery session yet, starting lazily");
            self.start_locked(&mut session).await?;
        }
        match session.as_ref() {
            Some(handle) => Ok(handle.backend()),
            None => Err(BaseError::IllegalState(
                "discovery session missing after start".to_string(),
            )),
        }
    }

    /// Publish a record and track it in the ledger on success.
    ///
    /// Backend failures propagate unmodified and leave the ledger untouched.
    /// A lazy-start failure surfaces as `IllegalState`.
    pub async fn publish(&self, record: ServiceRecord) -> Result<ServiceRecord> {
        if record.name.is_empty() {
            return Err(BaseError::Configuration(
                "service record name must not be empty".to_string(),
            ));
        }

        let backend = self
            .ensure_session()
            .await
            .map_err(|e| BaseError::IllegalState(e.to_string()))?;

        match backend.publish(&record).await {
            Ok(accepted) => {
                self.ledger.record(accepted.clone()).await;
                info!("Published {} record '{}'", accepted.kind.as_str(), accepted.name);
                Ok(accepted)
            }
            Err(e) => {
                warn!("Failed to publish record '{}': {}", record.name, e);
                Err(BaseError::BackendUnavailable(e))
            }
        }
    }

    /// Publish an HTTP endpoint record rooted at `/`, tagged with the
    /// configured API name.
    pub async fn publish_http_endpoint(
        &self,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<ServiceRecord> {
        let record = ServiceRecord::http_endpoint(name, host, port)
            .with_metadata(METADATA_API_NAME, self.config.api.name.clone());
        self.publish(record).await
    }

    /// Publish a message source record.
    pub async fn publish_message_source(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<ServiceRecord> {
        self.publish(ServiceRecord::message_source(name, address)).await
    }

    /// Publish a data source record.
    pub async fn publish_data_source(
        &self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Result<ServiceRecord> {
        self.publish(ServiceRecord::data_source(name, descriptor)).await
    }

    /// Publish an event-bus service record with its consumer-facing
    /// interface identifier.
    pub async fn publish_event_bus_service(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
        service_interface: impl Into<String>,
    ) -> Result<ServiceRecord> {
        self.publish(ServiceRecord::event_bus_service(name, address, service_interface))
            .await
    }

    /// Deregister every ledger entry, then close the discovery session.
    ///
    /// Unpublish requests go out concurrently and all outcomes are awaited
    /// before the session closes. Individual failures are logged; the first
    /// cause is carried in the returned `Shutdown` error. Calling stop when
    /// never started, or a second time, is a no-op success.
    pub async fn stop(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            debug!("Stop requested with no active discovery session");
            return Ok(());
        };

        let records = self.ledger.snapshot().await;
        if records.is_empty() {
            session.close().await?;
            info!("Stopped with nothing to deregister");
            return Ok(());
        }

        info!("Deregistering {} service record(s)", records.len());
        let session_ref = &session;
        let outcomes = futures::future::join_all(records.iter().map(|record| async move {
            (record, session_ref.unpublish(record).await)
        }))
        .await;

        let mut failed = 0usize;
        let mut first_cause: Option<DiscoveryError> = None;
        for (record, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    self.ledger.remove(&record.name).await;
                }
                Err(e) => {
                    warn!("Failed to deregister '{}': {}", record.name, e);
                    failed += 1;
                    if first_cause.is_none() {
                        first_cause = Some(e);
                    }
                }
            }
        }

        // Session close happens strictly after every unpublish settled, and
        // unconditionally.
        let close_outcome = session.close().await;

        if let Some(cause) = first_cause {
            if let Err(e) = close_outcome {
                warn!("Discovery session close failed during shutdown: {}", e);
            }
            return Err(BaseError::Shutdown { failed, source: cause });
        }
        close_outcome?;
        info!("Stopped; all records deregistered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use svcbase_api::DiscoveryConfig;
    use tokio::sync::RwLock;

    /// Backend with scriptable failures and call accounting.
    #[derive(Default)]
    struct ScriptedBackend {
        fail_publish: bool,
        fail_unpublish: RwLock<HashSet<String>>,
        published: RwLock<Vec<String>>,
        unpublished: RwLock<Vec<String>>,
        close_count: AtomicUsize,
    }

    impl ScriptedBackend {
        async fn fail_unpublish_of(&self, name: &str) {
            self.fail_unpublish.write().await.insert(name.to_string());
        }
    }

    #[async_trait::async_trait]
    impl DiscoveryBackend for ScriptedBackend {
        async fn publish(&self, record: &ServiceRecord) -> std::result::Result<ServiceRecord, DiscoveryError> {
            if self.fail_publish {
                return Err(DiscoveryError::Rejected {
                    operation: "publish",
                    name: record.name.clone(),
                    status: 503,
                });
            }
            self.published.write().await.push(record.name.clone());
            Ok(record.clone())
        }

        async fn unpublish(&self, record: &ServiceRecord) -> std::result::Result<(), DiscoveryError> {
            self.unpublished.write().await.push(record.name.clone());
            if self.fail_unpublish.read().await.contains(&record.name) {
                return Err(DiscoveryError::Rejected {
                    operation: "unpublish",
                    name: record.name.clone(),
                    status: 502,
                });
            }
            Ok(())
        }

        async fn close(&self) -> std::result::Result<(), DiscoveryError> {
            self.close_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedConnector {
        backend: Arc<ScriptedBackend>,
        fail_connect: bool,
        connect_count: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new(backend: Arc<ScriptedBackend>) -> Self {
            Self {
                backend,
                fail_connect: false,
                connect_count: AtomicUsize::new(0),
            }
        }

        fn failing(backend: Arc<ScriptedBackend>) -> Self {
            Self {
                fail_connect: true,
                ..Self::new(backend)
            }
        }
    }

    #[async_trait::async_trait]
    impl DiscoveryConnector for ScriptedConnector {
        async fn connect(
            &self,
            _settings: &DiscoveryConfig,
        ) -> std::result::Result<Arc<dyn DiscoveryBackend>, DiscoveryError> {
            self.connect_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(DiscoveryError::InvalidSettings(
                    "discovery endpoint is not configured".to_string(),
                ));
            }
            Ok(self.backend.clone())
        }
    }

    fn lifecycle_with(connector: Arc<ScriptedConnector>) -> ServiceLifecycle {
        ServiceLifecycle::with_connector(BaseConfig::default(), connector)
    }

    #[tokio::test]
    async fn test_publish_then_stop_scenario() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        lifecycle.start().await.unwrap();
        lifecycle
            .publish_http_endpoint("svc-a", "localhost", 8080)
            .await
            .unwrap();
        assert_eq!(lifecycle.ledger().len().await, 1);

        lifecycle.stop().await.unwrap();

        assert_eq!(*backend.unpublished.read().await, vec!["svc-a".to_string()]);
        assert_eq!(backend.close_count.load(Ordering::SeqCst), 1);
        assert!(lifecycle.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn test_stop_with_empty_ledger_closes_without_unpublish() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        lifecycle.start().await.unwrap();
        lifecycle.stop().await.unwrap();

        assert!(backend.unpublished.read().await.is_empty());
        assert_eq!(backend.close_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_never_started_is_noop() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        lifecycle.stop().await.unwrap();
        assert_eq!(backend.close_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_double_stop_closes_once() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        lifecycle.start().await.unwrap();
        lifecycle
            .publish_message_source("events", "amqp://broker/events")
            .await
            .unwrap();

        lifecycle.stop().await.unwrap();
        lifecycle.stop().await.unwrap();

        assert_eq!(backend.close_count.load(Ordering::SeqCst), 1);
        assert_eq!(backend.unpublished.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_unpublishes_every_record_before_close() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        lifecycle.publish_http_endpoint("svc-a", "localhost", 8081).await.unwrap();
        lifecycle.publish_message_source("events", "amqp://broker/events").await.unwrap();
        lifecycle.publish_data_source("db", "postgres://db:5432/app").await.unwrap();

        lifecycle.stop().await.unwrap();

        let mut unpublished = backend.unpublished.read().await.clone();
        unpublished.sort();
        assert_eq!(unpublished, vec!["db", "events", "svc-a"]);
        assert_eq!(backend.close_count.load(Ordering::SeqCst), 1);
        assert!(lifecycle.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn test_stop_aggregates_first_failure_and_still_closes() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.fail_unpublish_of("svc-b").await;
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        lifecycle.publish_http_endpoint("svc-a", "localhost", 8081).await.unwrap();
        lifecycle.publish_http_endpoint("svc-b", "localhost", 8082).await.unwrap();
        lifecycle.publish_http_endpoint("svc-c", "localhost", 8083).await.unwrap();

        let err = lifecycle.stop().await.unwrap_err();
        match err {
            BaseError::Shutdown { failed, source } => {
                assert_eq!(failed, 1);
                assert!(matches!(
                    source,
                    DiscoveryError::Rejected { ref name, .. } if name == "svc-b"
                ));
            }
            other => panic!("expected Shutdown error, got {:?}", other),
        }

        // All three were attempted, session closed exactly once, and only
        // the failed record remains in the ledger.
        assert_eq!(backend.unpublished.read().await.len(), 3);
        assert_eq!(backend.close_count.load(Ordering::SeqCst), 1);
        assert!(lifecycle.ledger().contains("svc-b").await);
        assert_eq!(lifecycle.ledger().len().await, 1);
    }

    #[tokio::test]
    async fn test_lazy_start_on_first_publish() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector.clone());

        lifecycle.publish_data_source("db", "postgres://db:5432/app").await.unwrap();
        lifecycle
            .publish_event_bus_service("orders", "orders.queue", "OrderService")
            .await
            .unwrap();

        assert_eq!(connector.connect_count.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.ledger().len().await, 2);
    }

    #[tokio::test]
    async fn test_lazy_start_failure_is_illegal_state() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::failing(backend.clone()));
        let lifecycle = lifecycle_with(connector.clone());

        let err = lifecycle
            .publish_http_endpoint("svc-a", "localhost", 8080)
            .await
            .unwrap_err();
        assert!(matches!(err, BaseError::IllegalState(_)));
        assert!(err.to_string().contains("cannot create discovery service"));

        assert_eq!(connector.connect_count.load(Ordering::SeqCst), 1);
        assert!(lifecycle.ledger().is_empty().await);
        assert!(backend.published.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_ledger_unchanged() {
        let backend = Arc::new(ScriptedBackend {
            fail_publish: true,
            ..ScriptedBackend::default()
        });
        let connector = Arc::new(ScriptedConnector::new(backend.clone()));
        let lifecycle = lifecycle_with(connector);

        let err = lifecycle
            .publish_http_endpoint("svc-a", "localhost", 8080)
            .await
            .unwrap_err();
        assert!(matches!(err, BaseError::BackendUnavailable(_)));
        assert!(lifecycle.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_record_name_rejected() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend));
        let lifecycle = lifecycle_with(connector);

        let err = lifecycle
            .publish(ServiceRecord::message_source("", "addr"))
            .await
            .unwrap_err();
        assert!(matches!(err, BaseError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_breaker_defaults_after_start() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend));
        let lifecycle = lifecycle_with(connector);

        assert!(lifecycle.breaker().is_none());
        lifecycle.start().await.unwrap();

        let breaker = lifecycle.breaker().unwrap();
        assert_eq!(breaker.name(), "circuit-breaker");
        assert_eq!(breaker.max_failures(), 5);
        assert_eq!(breaker.call_timeout(), std::time::Duration::from_millis(10_000));
        assert_eq!(breaker.reset_timeout(), std::time::Duration::from_millis(30_000));
        assert!(breaker.fallback_on_failure());

        // Restarting does not replace the shared instance.
        lifecycle.start().await.unwrap();
        assert!(Arc::ptr_eq(&breaker, &lifecycle.breaker().unwrap()));
    }

    #[tokio::test]
    async fn test_http_endpoint_carries_api_name() {
        let backend = Arc::new(ScriptedBackend::default());
        let connector = Arc::new(ScriptedConnector::new(backend));
        let mut config = BaseConfig::default();
        config.api.name = "billing".to_string();
        let lifecycle = ServiceLifecycle::with_connector(config, connector);

        let record = lifecycle
            .publish_http_endpoint("svc-a", "localhost", 8080)
            .await
            .unwrap();
        assert_eq!(
            record.metadata.get(METADATA_API_NAME).map(String::as_str),
            Some("billing")
        );
    }
}
