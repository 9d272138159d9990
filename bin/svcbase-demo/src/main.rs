use anyhow::Result;
use http_body_util::Full;
use hyper::{body::Bytes, server::conn::http1, service::service_fn, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use svcbase_api::BaseConfig;
use svcbase_core::ServiceLifecycle;
use svcbase_discovery::MemoryConnector;
use svcbase_http::{
    response, BaseRouter, CorsMiddleware, LoggingMiddleware, MetricsCollector, MetricsMiddleware,
    MiddlewareChain, MiddlewareContext, TokenAuthMiddleware,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::init as tracing_init;

const SERVICE_NAME: &str = "svcbase-demo";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    info!("Starting {}...", SERVICE_NAME);

    let config = load_config()?;
    let lifecycle = build_lifecycle(config.clone());
    lifecycle.start().await?;
    info!("Lifecycle started");

    if let Some(breaker) = lifecycle.breaker() {
        info!(
            "Circuit breaker '{}' ready (max failures {}, call timeout {:?})",
            breaker.name(),
            breaker.max_failures(),
            breaker.call_timeout()
        );
    }

    lifecycle
        .publish_http_endpoint(SERVICE_NAME, config.http.host.clone(), config.http.port)
        .await?;

    let collector = MetricsCollector::new()?;
    let mut chain = MiddlewareChain::new()
        .add(LoggingMiddleware)
        .add(MetricsMiddleware::new(collector.clone()));
    if let Some(token) = &config.http.auth_token {
        info!("Token auth gate enabled");
        chain = chain.add(TokenAuthMiddleware::new(
            token.clone(),
            vec![
                config.heartbeat.path.clone(),
                config.metrics.path.clone(),
            ],
        ));
    }
    let router = Arc::new(BaseRouter::new(
        lifecycle.clone(),
        collector,
        Arc::new(chain),
        Arc::new(CorsMiddleware::allow_any()),
    ));

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _peer) = accepted?;
                let io = TokioIo::new(stream);
                let router = router.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req| {
                        let router = router.clone();
                        async move { handle_request(req, router).await }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        warn!("Connection error: {}", e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Err(e) = lifecycle.stop().await {
        error!("Shutdown finished with errors: {}", e);
        return Err(e.into());
    }
    info!("Stopped cleanly");
    Ok(())
}

fn load_config() -> Result<BaseConfig> {
    match std::env::var("SVCBASE_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            BaseConfig::from_file(&path)
        }
        Err(_) => {
            info!("SVCBASE_CONFIG not set, using defaults");
            Ok(BaseConfig::default())
        }
    }
}

/// Use the HTTP registry when an endpoint is configured, otherwise fall back
/// to the in-process registry so the demo runs standalone.
fn build_lifecycle(config: BaseConfig) -> Arc<ServiceLifecycle> {
    if config.discovery.endpoint.is_empty() {
        warn!("No discovery endpoint configured, using in-memory registry");
        Arc::new(ServiceLifecycle::with_connector(
            config,
            Arc::new(MemoryConnector::new()),
        ))
    } else {
        Arc::new(ServiceLifecycle::new(config))
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: Arc<BaseRouter>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let context = MiddlewareContext::from_request(&req);

    if let Some(response) = router.dispatch(&context).await {
        return Ok(response);
    }

    let mut response = match (context.method.as_str(), context.path.as_str()) {
        ("GET", "/") => response::ok(&serde_json::json!({
            "service": SERVICE_NAME,
            "message": "hello from the svcbase demo",
        })),
        _ => response::not_found(format!("no route for {}", context.path)),
    };
    router.finish(&context, &mut response).await;
    Ok(response)
}
