//! HTTP registry backend
//!
//! Talks to a discovery registry over its REST API: records are published
//! with `POST {base}/v1/services` and removed with
//! `DELETE {base}/v1/services/{name}`.

use crate::backend::{DiscoveryBackend, DiscoveryConnector};
use crate::error::DiscoveryError;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use svcbase_api::{DiscoveryConfig, ServiceRecord};
use tracing::debug;

/// Discovery backend over an HTTP registry
#[derive(Debug)]
pub struct HttpDiscoveryBackend {
    client: Client,
    base: String,
}

impl HttpDiscoveryBackend {
    /// Validate the settings and build the backend client.
    ///
    /// This validates the endpoint URL but does not contact the registry;
    /// the first publish does.
    pub fn connect(settings: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        if settings.endpoint.is_empty() {
            return Err(DiscoveryError::InvalidSettings(
                "discovery endpoint is not configured".to_string(),
            ));
        }
        let url = Url::parse(&settings.endpoint).map_err(|e| {
            DiscoveryError::InvalidSettings(format!(
                "invalid discovery endpoint '{}': {}",
                settings.endpoint, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DiscoveryError::InvalidSettings(format!(
                "discovery endpoint '{}' must be http or https",
                settings.endpoint
            )));
        }

        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn services_url(&self) -> String {
        format!("{}/v1/services", self.base)
    }

    fn service_url(&self, name: &str) -> String {
        format!("{}/v1/services/{}", self.base, name)
    }
}

#[async_trait::async_trait]
impl DiscoveryBackend for HttpDiscoveryBackend {
    async fn publish(&self, record: &ServiceRecord) -> Result<ServiceRecord, DiscoveryError> {
        let response = self
            .client
            .post(self.services_url())
            .json(record)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let accepted: ServiceRecord = response.json().await?;
                debug!("Registry accepted record '{}'", accepted.name);
                Ok(accepted)
            }
            status => Err(DiscoveryError::Rejected {
                operation: "publish",
                name: record.name.clone(),
                status: status.as_u16(),
            }),
        }
    }

    async fn unpublish(&self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        let response = self
            .client
            .delete(self.service_url(&record.name))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!("Registry removed record '{}'", record.name);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(DiscoveryError::NotFound(record.name.clone())),
            status => Err(DiscoveryError::Rejected {
                operation: "unpublish",
                name: record.name.clone(),
                status: status.as_u16(),
            }),
        }
    }

    async fn close(&self) -> Result<(), DiscoveryError> {
        // Connections are pooled by reqwest; nothing to tear down remotely.
        debug!("HTTP discovery backend closed");
        Ok(())
    }
}

/// Connector producing `HttpDiscoveryBackend` instances; the default for
/// production processes
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpConnector;

#[async_trait::async_trait]
impl DiscoveryConnector for HttpConnector {
    async fn connect(
        &self,
        settings: &DiscoveryConfig,
    ) -> Result<Arc<dyn DiscoveryBackend>, DiscoveryError> {
        let backend = HttpDiscoveryBackend::connect(settings)?;
        Ok(Arc::new(backend))
    }
}
