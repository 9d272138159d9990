//! Middleware chain for cross-cutting HTTP concerns
//!
//! Middleware see a transport-agnostic context; the host router decides how
//! an `on_request` failure is shaped (the token gate surfaces as the 400
//! envelope).

use anyhow::Result;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, span, Level};

/// Context passed through the middleware chain
#[derive(Clone)]
pub struct MiddlewareContext {
    /// Request path
    pub path: String,
    /// Request method
    pub method: String,
    /// Request headers (lower-cased names)
    pub request_headers: HashMap<String, String>,
    /// Custom metadata for middleware
    pub metadata: Arc<std::sync::Mutex<HashMap<String, String>>>,
}

impl MiddlewareContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            request_headers: HashMap::new(),
            metadata: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Build a context from a hyper request.
    pub fn from_request<B>(req: &hyper::Request<B>) -> Self {
        let mut headers = HashMap::new();
        for (k, v) in req.headers() {
            if let Ok(v_str) = v.to_str() {
                headers.insert(k.as_str().to_lowercase(), v_str.to_string());
            }
        }
        Self {
            path: req.uri().path().to_string(),
            method: req.method().to_string(),
            request_headers: headers,
            metadata: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request_headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.metadata.lock().ok().and_then(|m| m.get(key).cloned())
    }

    pub fn set_metadata(&self, key: String, value: String) {
        if let Ok(mut m) = self.metadata.lock() {
            m.insert(key, value);
        }
    }
}

/// Middleware trait for processing requests and responses
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str {
        "UnnamedMiddleware"
    }

    /// Called before the request is processed; an error aborts the chain.
    async fn on_request(&self, _context: &MiddlewareContext) -> Result<()> {
        Ok(())
    }

    /// Called after the response is ready.
    async fn on_response(&self, _context: &MiddlewareContext, _status: u16) -> Result<()> {
        Ok(())
    }

    /// Called when request handling failed.
    async fn on_error(&self, _context: &MiddlewareContext, _error: &str) -> Result<()> {
        Ok(())
    }
}

/// Chain of middleware executed in order
#[derive(Default)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Process the request through all middleware, aborting on first error.
    pub async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        for mw in &self.middleware {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            let _guard = span.enter();
            mw.on_request(context).await?;
        }
        Ok(())
    }

    /// Process the response through all middleware, in reverse order.
    pub async fn on_response(&self, context: &MiddlewareContext, status: u16) -> Result<()> {
        for mw in self.middleware.iter().rev() {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            let _guard = span.enter();
            mw.on_response(context, status).await?;
        }
        Ok(())
    }

    pub async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        for mw in &self.middleware {
            mw.on_error(context, error).await?;
        }
        Ok(())
    }
}

/// Logs request and response with wall-clock duration
pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        debug!("Request: {} {}", context.method, context.path);
        context.set_metadata(
            "start_time".to_string(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)?
                .as_millis()
                .to_string(),
        );
        Ok(())
    }

    async fn on_response(&self, context: &MiddlewareContext, status: u16) -> Result<()> {
        let duration = context
            .get_metadata("start_time")
            .and_then(|s| s.parse::<u128>().ok())
            .map(|start| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|now| now.as_millis().saturating_sub(start))
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        debug!(
            "Response: {} {} -> {} ({}ms)",
            context.method, context.path, status, duration
        );
        Ok(())
    }

    async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        debug!("Error: {} {} - {}", context.method, context.path, error);
        Ok(())
    }
}

/// CORS policy: origin allow-list, preflight detection and response header
/// injection
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
}

impl CorsMiddleware {
    /// Allow the given origins; `*` allows any.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// Allow any origin.
    pub fn allow_any() -> Self {
        Self::new(vec!["*".to_string()])
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }

    /// Whether the request is a CORS preflight.
    pub fn is_preflight(context: &MiddlewareContext) -> bool {
        context.method == "OPTIONS" && context.header("access-control-request-method").is_some()
    }

    /// Inject CORS headers into an outgoing response.
    pub fn apply(&self, context: &MiddlewareContext, response: &mut Response<Full<Bytes>>) {
        let origin = match context.header("origin") {
            Some(origin) if self.allows_origin(origin) => origin.to_string(),
            Some(_) => return,
            None => return,
        };
        let headers = response.headers_mut();
        if let Ok(value) = origin.parse() {
            headers.insert("access-control-allow-origin", value);
        }
        headers.insert(
            "access-control-allow-methods",
            "GET, POST, PUT, DELETE, OPTIONS".parse().unwrap(),
        );
        headers.insert(
            "access-control-allow-headers",
            "authorization, content-type".parse().unwrap(),
        );
    }
}

#[async_trait::async_trait]
impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        if let Some(origin) = context.header("origin") {
            debug!("CORS request from origin {}", origin);
        }
        Ok(())
    }
}

/// Bearer-token gate for the HTTP surface.
///
/// Exempt paths (heartbeat, metrics) pass without a token. A failure here
/// aborts the chain; the router shapes it as the 400 envelope.
pub struct TokenAuthMiddleware {
    token: String,
    exempt_paths: Vec<String>,
}

impl TokenAuthMiddleware {
    pub fn new(token: impl Into<String>, exempt_paths: Vec<String>) -> Self {
        Self {
            token: token.into(),
            exempt_paths,
        }
    }
}

#[async_trait::async_trait]
impl Middleware for TokenAuthMiddleware {
    fn name(&self) -> &'static str {
        "TokenAuthMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        if self.exempt_paths.iter().any(|p| p == &context.path) {
            return Ok(());
        }
        match context.header("authorization") {
            Some(value) if value == format!("Bearer {}", self.token) => Ok(()),
            Some(_) => anyhow::bail!("invalid bearer token"),
            None => anyhow::bail!("missing bearer token"),
        }
    }
}
