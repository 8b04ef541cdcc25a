use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use capability_registry::CapabilityRegistry;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::GatewayConfig, routes};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CapabilityRegistry>,
    started_at: Instant,
}

impl AppState {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
    })
}

async fn fallback() -> Response {
    routes::error::not_found("route_not_found", "No route matches this request")
}

async fn enforce_request_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(path = %path, timeout_ms = limit.as_millis() as u64, "Request timed out");
            routes::error::create_error(
                StatusCode::REQUEST_TIMEOUT,
                "request_timeout",
                &format!("Request did not complete within {}ms", limit.as_millis()),
                None,
            )
        }
    }
}

/// Abort handlers that run past `limit` with a `request_timeout` error body.
pub fn with_request_timeout<S>(router: Router<S>, limit: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(limit, enforce_request_timeout))
}

pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", routes::api_router())
        .fallback(fallback);

    with_request_timeout(router, request_timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn startup(config: GatewayConfig) -> anyhow::Result<()> {
    let registry = Arc::new(CapabilityRegistry::new(config.registry.clone())?);
    let app = build_app(AppState::new(registry), config.request_timeout);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, "Capability registry listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
