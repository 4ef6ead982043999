use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{middleware::from_fn, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

pub mod config;
pub mod request_id;
pub mod web;

pub use axum::Router;
pub use config::ApiIngressConfig;

/// HTTP host: owns the middleware stack and the serve loop.
/// Feature modules contribute routes; this module wraps and serves them.
#[derive(Debug, Clone)]
pub struct ApiIngress {
    config: ApiIngressConfig,
}

impl ApiIngress {
    pub const NAME: &'static str = "api_ingress";

    pub fn new(config: ApiIngressConfig) -> Self {
        Self { config }
    }

    /// Effective bind address: explicit `bind_addr`, else `host:port`.
    pub fn bind_addr(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let raw = match &self.config.bind_addr {
            Some(addr) if !addr.trim().is_empty() => addr.trim().to_string(),
            _ => format!("{host}:{port}"),
        };
        raw.parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", raw, e))
    }

    /// Add the root/health endpoints to `routes` and wrap everything in the
    /// middleware stack.
    pub fn build_router(&self, routes: Router) -> Router {
        tracing::debug!("Building HTTP router");
        let mut router = routes
            .route("/", get(web::root))
            .route("/health", get(web::health_check));

        // Layers are applied innermost first; the last one added sees the request first:
        // SetRequestId -> PropagateRequestId -> Trace -> push_req_id_to_extensions -> Timeout -> CORS -> BodyLimit
        router = router.layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes));

        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router = router.layer(TimeoutLayer::new(Duration::from_secs(
            self.config.request_timeout_secs,
        )));

        router = router.layer(from_fn(request_id::push_req_id_to_extensions));
        router = router.layer(request_id::create_trace_layer());

        router = router.layer(PropagateRequestIdLayer::new(request_id::REQUEST_ID_HEADER));
        router.layer(SetRequestIdLayer::new(
            request_id::REQUEST_ID_HEADER,
            request_id::MakeReqId,
        ))
    }

    /// Bind `addr` and serve until `cancel` fires.
    pub async fn serve(&self, addr: SocketAddr, router: Router, cancel: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind HTTP listener on {addr}"))?;
        serve_with_listener(listener, router, cancel).await
    }
}

/// Serve on an already-bound listener until `cancel` fires, then drain in-flight requests.
pub async fn serve_with_listener(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    tracing::info!("HTTP server bound on {}", local);

    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully (cancellation)");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
