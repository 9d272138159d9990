//! Discovery client facade
//!
//! This library provides:
//! - `DiscoveryBackend` and `DiscoveryConnector` traits at the registry boundary
//! - `DiscoverySession`, the handle owned by the lifecycle orchestrator
//! - An HTTP registry backend (reqwest) and an in-memory backend for local runs

pub mod backend;
pub mod error;
pub mod http;
pub mod memory;

pub use backend::{DiscoveryBackend, DiscoveryConnector, DiscoverySession};
pub use error::DiscoveryError;
pub use http::{HttpConnector, HttpDiscoveryBackend};
pub use memory::{MemoryConnector, MemoryDiscoveryBackend};
