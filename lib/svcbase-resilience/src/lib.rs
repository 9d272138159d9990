//! Circuit breaker for outbound calls
//!
//! One breaker instance is constructed per process from the
//! `circuit-breaker` config section and shared by every protected call.

pub mod breaker;

pub use breaker::{BreakerError, BreakerState, BreakerStats, CircuitBreaker};
