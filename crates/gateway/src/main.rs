//! CiteGuard API Gateway
//!
//! The entry point for all external requests. Handles:
//! - Request routing for search and admin operations
//! - Request-level rate limiting
//! - Observability (logging, metrics)
//!
//! The orchestrator is the async unit; everything here runs under this one
//! long-lived runtime.

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use citeguard_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics,
};
use citeguard_engine::{CoreContext, SimilarityService};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SimilarityService>,
    pub limiter: Option<Arc<middleware::rate_limit::GlobalRateLimiter>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability);
    init_metrics(&config.observability)?;

    info!("CiteGuard gateway v{} starting", citeguard_common::VERSION);

    let port = config.server.port;
    let rate_limit = config.rate_limit.clone();

    // Wire the core; embedding init failure aborts startup
    let ctx = Arc::new(CoreContext::initialize(config).await?);
    let service = Arc::new(SimilarityService::new(ctx));

    let limiter = rate_limit.enabled.then(|| {
        middleware::rate_limit::create_rate_limiter(rate_limit.requests_per_second, rate_limit.burst)
    });

    let app = create_router(AppState { service, limiter });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway drained; exiting");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(observability.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(observability: &ObservabilityConfig) -> anyhow::Result<()> {
    if observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("failed to install metrics exporter: {}", e))?;
    }
    metrics::register_metrics();
    Ok(())
}

/// Create the main application router.
///
/// The API surface under `/v2` sits behind the request-level rate limiter;
/// health probes do not.
fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Search endpoints
        .route("/similarity", post(handlers::search::similarity))
        .route("/plagiarism", post(handlers::search::plagiarism))
        .route("/index/search", post(handlers::search::index_search))
        // Admin endpoints
        .route("/admin/save", post(handlers::admin::save))
        .route("/admin/clear", post(handlers::admin::clear))
        .route("/admin/backup", post(handlers::admin::backup))
        .route("/admin/remove-duplicates", post(handlers::admin::remove_duplicates))
        .route("/admin/reset-limits", post(handlers::admin::reset_limits))
        .route("/admin/clear-result-cache", post(handlers::admin::clear_result_cache))
        .route("/admin/deduplication-stats", get(handlers::admin::deduplication_stats))
        .route("/admin/stats", get(handlers::admin::index_stats))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ));

    Router::new()
        .nest("/v2", api)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .with_state(state)
        .layer(
            // Outermost first: stamp a request id, trace with it, then the
            // permissive CORS this service ships with (real deployments put
            // their own policy in front)
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Resolve when the process is asked to stop (SIGINT, and SIGTERM on unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested; draining in-flight requests");
}
