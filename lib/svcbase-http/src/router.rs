//! Base router serving the standard endpoints of every service instance
//!
//! Owns the heartbeat and metrics paths from the process configuration and
//! runs the middleware chain around them; application routes fall through
//! to the host service.

use crate::metrics::MetricsCollector;
use crate::middleware::{CorsMiddleware, MiddlewareChain, MiddlewareContext};
use crate::response;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{header, Response, StatusCode};
use std::sync::Arc;
use svcbase_core::ServiceLifecycle;
use tracing::debug;

/// Router for the cross-cutting HTTP surface
pub struct BaseRouter {
    lifecycle: Arc<ServiceLifecycle>,
    collector: MetricsCollector,
    chain: Arc<MiddlewareChain>,
    cors: Arc<CorsMiddleware>,
}

impl BaseRouter {
    pub fn new(
        lifecycle: Arc<ServiceLifecycle>,
        collector: MetricsCollector,
        chain: Arc<MiddlewareChain>,
        cors: Arc<CorsMiddleware>,
    ) -> Self {
        Self {
            lifecycle,
            collector,
            chain,
            cors,
        }
    }

    pub fn heartbeat_path(&self) -> &str {
        &self.lifecycle.config().heartbeat.path
    }

    pub fn metrics_path(&self) -> &str {
        &self.lifecycle.config().metrics.path
    }

    /// Run the middleware chain and serve the base endpoints.
    ///
    /// Returns None when the path belongs to the host application; the host
    /// must then call [`finish`](Self::finish) with its own response.
    pub async fn dispatch(&self, context: &MiddlewareContext) -> Option<Response<Full<Bytes>>> {
        if let Err(e) = self.chain.on_request(context).await {
            let _ = self.chain.on_error(context, &e.to_string()).await;
            let mut response = response::bad_request(e.to_string());
            self.finish(context, &mut response).await;
            return Some(response);
        }

        if CorsMiddleware::is_preflight(context) {
            let mut response = response::no_content();
            self.finish(context, &mut response).await;
            return Some(response);
        }

        let mut response = if context.path == self.heartbeat_path() {
            self.heartbeat().await
        } else if context.path == self.metrics_path() {
            self.metrics()
        } else {
            debug!("Path {} falls through to the application", context.path);
            return None;
        };

        self.finish(context, &mut response).await;
        Some(response)
    }

    /// Apply CORS headers and run the response side of the chain.
    pub async fn finish(&self, context: &MiddlewareContext, response: &mut Response<Full<Bytes>>) {
        self.cors.apply(context, response);
        let status = response.status().as_u16();
        if let Err(e) = self.chain.on_response(context, status).await {
            debug!("Middleware on_response failed: {}", e);
        }
    }

    async fn heartbeat(&self) -> Response<Full<Bytes>> {
        let published = self.lifecycle.ledger().len().await;
        response::ok(&serde_json::json!({
            "status": "up",
            "published": published,
        }))
    }

    fn metrics(&self) -> Response<Full<Bytes>> {
        match self.collector.gather() {
            Ok(text) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(text)))
                .unwrap(),
            Err(e) => response::service_unavailable(format!("metrics unavailable: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsMiddleware;
    use crate::middleware::{LoggingMiddleware, TokenAuthMiddleware};
    use http_body_util::BodyExt;
    use svcbase_api::BaseConfig;

    fn router(auth_token: Option<&str>) -> BaseRouter {
        let lifecycle = Arc::new(ServiceLifecycle::new(BaseConfig::default()));
        let collector = MetricsCollector::new().unwrap();
        let mut chain = MiddlewareChain::new()
            .add(LoggingMiddleware)
            .add(MetricsMiddleware::new(collector.clone()));
        if let Some(token) = auth_token {
            chain = chain.add(TokenAuthMiddleware::new(
                token,
                vec!["/health".to_string(), "/metrics".to_string()],
            ));
        }
        BaseRouter::new(
            lifecycle,
            collector,
            Arc::new(chain),
            Arc::new(CorsMiddleware::allow_any()),
        )
    }

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_served_on_configured_path() {
        let router = router(None);
        let context = MiddlewareContext::new("GET", "/health");
        let response = router.dispatch(&context).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "up");
        assert_eq!(body["published"], 0);
    }

    #[tokio::test]
    async fn test_metrics_served_as_text() {
        let router = router(None);
        let context = MiddlewareContext::new("GET", "/metrics");
        let response = router.dispatch(&context).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("http_errors_total"));
    }

    #[tokio::test]
    async fn test_app_paths_fall_through() {
        let router = router(None);
        let context = MiddlewareContext::new("GET", "/api/things");
        assert!(router.dispatch(&context).await.is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_shaped_as_400_envelope() {
        let router = router(Some("s3cret"));
        let context = MiddlewareContext::new("GET", "/api/things");
        let response = router.dispatch(&context).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_auth_exempts_heartbeat() {
        let router = router(Some("s3cret"));
        let context = MiddlewareContext::new("GET", "/health");
        let response = router.dispatch(&context).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_preflight_gets_cors_headers() {
        let router = router(None);
        let mut context = MiddlewareContext::new("OPTIONS", "/api/things");
        context
            .request_headers
            .insert("origin".to_string(), "https://app.example".to_string());
        context.request_headers.insert(
            "access-control-request-method".to_string(),
            "POST".to_string(),
        );
        let response = router.dispatch(&context).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "https://app.example"
        );
    }
}
