//! Gatewarden Admin API
//!
//! The configuration surface of the gateway control plane.
//! Handles:
//! - Service aggregate management (HTTP/TCP/gRPC rules, policies)
//! - Renter management and the renter directory
//! - Dashboard aggregations
//! - Observability (logging, metrics, tracing)

mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use chrono_tz::Tz;
use gatewarden_common::{
    catalog::ServiceWriter,
    config::AppConfig,
    db::DbPool,
    flow::{FlowCounter, MemoryFlowCounter},
    metrics,
    renters::RenterDirectory,
    Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub writer: ServiceWriter,
    pub directory: Arc<RenterDirectory>,
    pub flow: Arc<dyn FlowCounter>,
    pub tz: Tz,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Gatewarden Admin API v{}", gatewarden_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);
    let tz = config.time_zone()?;

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    let repo = Repository::new(db.clone());
    let writer = ServiceWriter::new(db.clone(), config.ports.clone());
    let directory = Arc::new(RenterDirectory::new(Arc::new(repo)));

    // In-process counter backend; a real measurement engine replaces this
    // behind the same trait.
    let flow: Arc<dyn FlowCounter> = Arc::new(MemoryFlowCounter::new());

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        writer,
        directory,
        flow,
        tz,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Service endpoints
        .route("/services", get(handlers::services::list_services))
        .route("/services/http", post(handlers::services::create_http_service))
        .route("/services/http/{id}", put(handlers::services::update_http_service))
        .route("/services/tcp", post(handlers::services::create_tcp_service))
        .route("/services/tcp/{id}", put(handlers::services::update_tcp_service))
        .route("/services/grpc", post(handlers::services::create_grpc_service))
        .route("/services/grpc/{id}", put(handlers::services::update_grpc_service))
        .route(
            "/services/by-name/{name}",
            get(handlers::services::service_detail_by_name),
        )
        .route("/services/{id}", get(handlers::services::service_detail))
        .route("/services/{id}", delete(handlers::services::delete_service))
        .route("/services/{id}/stats", get(handlers::services::service_stats))

        // Renter endpoints
        .route("/renters", get(handlers::renters::list_renters))
        .route("/renters", post(handlers::renters::create_renter))
        .route("/renters/{id}", get(handlers::renters::renter_detail))
        .route("/renters/{id}", put(handlers::renters::update_renter))
        .route("/renters/{id}", delete(handlers::renters::delete_renter))
        .route("/renters/{id}/stats", get(handlers::renters::renter_stats))

        // Directory endpoints (consumed by the proxy fleet)
        .route("/directory/renters", get(handlers::directory::list_directory))
        .route(
            "/directory/renters/{renter_id}",
            get(handlers::directory::lookup_renter),
        )

        // Dashboard endpoints
        .route("/dashboard/overview", get(handlers::dashboard::overview))
        .route("/dashboard/flow", get(handlers::dashboard::flow_stats))
        .route("/dashboard/services", get(handlers::dashboard::service_stats));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
