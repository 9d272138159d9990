//! Service record types published to the discovery registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the API name for HTTP endpoint records.
pub const METADATA_API_NAME: &str = "api.name";

/// Metadata key carrying the consumer-facing interface of an event-bus service.
pub const METADATA_SERVICE_INTERFACE: &str = "service.interface";

/// Kind of capability a service record describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    HttpEndpoint,
    MessageSource,
    DataSource,
    EventBusService,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::HttpEndpoint => "http-endpoint",
            ServiceKind::MessageSource => "message-source",
            ServiceKind::DataSource => "data-source",
            ServiceKind::EventBusService => "event-bus-service",
        }
    }
}

/// Where a published capability can be reached; shape depends on the kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServiceLocation {
    /// HTTP endpoint location (host, port and root path)
    Http { host: String, port: u16, root: String },
    /// Plain address, e.g. an event-bus or broker address
    Address { address: String },
    /// Opaque connection descriptor for data sources
    Connection { descriptor: String },
}

/// A published description of one capability.
///
/// Records are immutable once constructed; use the per-kind constructors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub kind: ServiceKind,
    pub location: ServiceLocation,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceRecord {
    /// Build an HTTP endpoint record; the root path is fixed to `/`.
    pub fn http_endpoint(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::HttpEndpoint,
            location: ServiceLocation::Http {
                host: host.into(),
                port,
                root: "/".to_string(),
            },
            metadata: HashMap::new(),
        }
    }

    /// Build a message source record (no metadata).
    pub fn message_source(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::MessageSource,
            location: ServiceLocation::Address {
                address: address.into(),
            },
            metadata: HashMap::new(),
        }
    }

    /// Build a data source record with an opaque connection descriptor.
    pub fn data_source(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::DataSource,
            location: ServiceLocation::Connection {
                descriptor: descriptor.into(),
            },
            metadata: HashMap::new(),
        }
    }

    /// Build an event-bus service record.
    ///
    /// The service interface identifier is used by the backend to type-check
    /// consumers; it is carried in the record metadata.
    pub fn event_bus_service(
        name: impl Into<String>,
        address: impl Into<String>,
        service_interface: impl Into<String>,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            METADATA_SERVICE_INTERFACE.to_string(),
            service_interface.into(),
        );
        Self {
            name: name.into(),
            kind: ServiceKind::EventBusService,
            location: ServiceLocation::Address {
                address: address.into(),
            },
            metadata,
        }
    }

    /// Return a copy of this record with one metadata entry added.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_endpoint_record() {
        let record = ServiceRecord::http_endpoint("svc-a", "localhost", 8080);
        assert_eq!(record.name, "svc-a");
        assert_eq!(record.kind, ServiceKind::HttpEndpoint);
        assert_eq!(
            record.location,
            ServiceLocation::Http {
                host: "localhost".to_string(),
                port: 8080,
                root: "/".to_string(),
            }
        );
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_event_bus_record_carries_interface() {
        let record = ServiceRecord::event_bus_service("orders", "orders.queue", "OrderService");
        assert_eq!(
            record.metadata.get(METADATA_SERVICE_INTERFACE).map(String::as_str),
            Some("OrderService")
        );
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = ServiceRecord::http_endpoint("svc-a", "localhost", 8080)
            .with_metadata(METADATA_API_NAME, "billing");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"http-endpoint\""));
        let back: ServiceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
