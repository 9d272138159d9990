//! REST conventions shared by svcbase services
//!
//! This library provides:
//! - The standard JSON response envelope and per-status helpers
//! - A middleware chain (logging, CORS, token auth, metrics)
//! - The Prometheus collector and the base router serving the heartbeat
//!   and metrics paths

pub mod metrics;
pub mod middleware;
pub mod response;
pub mod router;

pub use metrics::{MetricsCollector, MetricsMiddleware};
pub use middleware::{
    CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareContext,
    TokenAuthMiddleware,
};
pub use response::ErrorBody;
pub use router::BaseRouter;
