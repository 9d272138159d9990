//! Prometheus metrics for the service's HTTP surface

use crate::middleware::{Middleware, MiddlewareContext};
use anyhow::Result;
use prometheus::{Counter, CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus collector exposed at the configured metrics path
pub struct MetricsCollector {
    /// Total HTTP requests received
    pub http_requests_total: CounterVec,
    /// HTTP request duration in seconds
    pub http_request_duration_seconds: HistogramVec,
    /// HTTP responses by status code
    pub http_responses_total: CounterVec,
    /// HTTP errors total
    pub http_errors_total: Counter,
    registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "path"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            Opts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .into(),
            &["method", "path"],
        )?;
        let http_responses_total = CounterVec::new(
            Opts::new("http_responses_total", "Total HTTP responses by status"),
            &["status"],
        )?;
        let http_errors_total = Counter::new("http_errors_total", "Total HTTP errors")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_responses_total.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            http_responses_total,
            http_errors_total,
            registry,
        })
    }

    /// Render all metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        // Clones share the same registry and series.
        Self {
            http_requests_total: self.http_requests_total.clone(),
            http_request_duration_seconds: self.http_request_duration_seconds.clone(),
            http_responses_total: self.http_responses_total.clone(),
            http_errors_total: self.http_errors_total.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// Middleware recording request/response/error counters and latency
pub struct MetricsMiddleware {
    pub collector: MetricsCollector,
}

impl MetricsMiddleware {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }
}

#[async_trait::async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "MetricsMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        self.collector
            .http_requests_total
            .with_label_values(&[&context.method, &context.path])
            .inc();
        context.set_metadata(
            "metrics_start_time".to_string(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_secs_f64()
                .to_string(),
        );
        Ok(())
    }

    async fn on_response(&self, context: &MiddlewareContext, status: u16) -> Result<()> {
        self.collector
            .http_responses_total
            .with_label_values(&[&status.to_string()])
            .inc();

        if let Some(start) = context
            .get_metadata("metrics_start_time")
            .and_then(|s| s.parse::<f64>().ok())
        {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_secs_f64();
            self.collector
                .http_request_duration_seconds
                .with_label_values(&[&context.method, &context.path])
                .observe(now - start);
        }
        Ok(())
    }

    async fn on_error(&self, _context: &MiddlewareContext, _error: &str) -> Result<()> {
        self.collector.http_errors_total.inc();
        Ok(())
    }
}
