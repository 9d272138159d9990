//! Service lifecycle and resilience layer
//!
//! This library provides:
//! - The registration ledger tracking what this process has published
//! - The lifecycle orchestrator owning start/stop sequencing, the discovery
//!   session and the shared circuit breaker
//! - The error taxonomy for the base layer

pub mod error;
pub mod ledger;
pub mod lifecycle;

pub use error::{BaseError, Result};
pub use ledger::RegistrationLedger;
pub use lifecycle::ServiceLifecycle;
