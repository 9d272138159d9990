//! Shared types for the svcbase microservice base layer
//!
//! This library provides:
//! - Service record types published to the discovery registry
//! - Process configuration with the recognized config sections

pub mod config;
pub mod record;

pub use config::{
    ApiConfig, BaseConfig, BreakerConfig, DiscoveryConfig, HeartbeatConfig, HttpConfig,
    MetricsConfig,
};
pub use record::{ServiceKind, ServiceLocation, ServiceRecord};
