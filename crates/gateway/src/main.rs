//! PaperVault API Gateway
//!
//! HTTP entry point for uploading research papers and browsing their
//! metadata. Handles:
//! - Multipart uploads forwarded to object storage
//! - Metadata search, listing and lookup
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use papervault_common::{
    config::AppConfig,
    db::{self, MetadataStore},
    metrics,
    storage::{self, ObjectStore},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metadata: Arc<dyn MetadataStore>,
    pub storage: Arc<dyn ObjectStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting PaperVault API Gateway v{}",
        papervault_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Prometheus exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Initialize backends
    let metadata = db::create_metadata_store(&config.database).await?;
    let storage = storage::create_object_store(&config.storage)?;

    info!(
        database = %config.database.provider,
        storage = %config.storage.provider,
        bucket = %storage.bucket(),
        "Backends initialized"
    );

    // Create app state
    let state = AppState {
        config: config.clone(),
        metadata,
        storage,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
pub(crate) fn create_router(state: AppState) -> Router {
    // CORS configuration, wide open until a frontend origin is pinned
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let upload_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Upload
        .route("/upload", post(handlers::upload::upload_paper).layer(upload_limit))

        // Metadata reads
        .route("/search", get(handlers::papers::search_papers))
        .route("/papers", get(handlers::papers::list_papers))
        .route("/paper/{paper_id}", get(handlers::papers::get_paper))

        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for handler tests

    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::response::Response;
    use papervault_common::db::{MemoryMetadataStore, NewPaper};
    use papervault_common::storage::MemoryObjectStore;
    use tower::ServiceExt;

    pub const ORIGIN: &str = "https://demo.supabase.co";

    pub struct TestApp {
        pub router: Router,
        pub metadata: Arc<MemoryMetadataStore>,
        pub storage: Arc<MemoryObjectStore>,
    }

    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.endpoint = ORIGIN.to_string();
        config.server.max_upload_bytes = 64 * 1024;
        config
    }

    pub fn test_app() -> TestApp {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let storage = Arc::new(MemoryObjectStore::new("research-papers"));

        let state = AppState {
            config: Arc::new(test_config()),
            metadata: metadata.clone(),
            storage: storage.clone(),
        };

        TestApp {
            router: create_router(state),
            metadata,
            storage,
        }
    }

    /// Router over arbitrary backends, for fault injection
    pub fn router_with(metadata: Arc<dyn MetadataStore>, storage: Arc<dyn ObjectStore>) -> Router {
        create_router(AppState {
            config: Arc::new(test_config()),
            metadata,
            storage,
        })
    }

    pub fn paper(title: &str, department: &str, date: &str) -> NewPaper {
        NewPaper {
            title: title.to_string(),
            authors: "Grace Hopper".to_string(),
            department: department.to_string(),
            publication_date: date.parse().unwrap(),
            journal: "Annals of Computing".to_string(),
            keywords: "compilers".to_string(),
            file_url: format!("{}/storage/v1/object/public/research-papers/{}.pdf", ORIGIN, title),
        }
    }

    pub async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(router: &Router, uri: &str) -> Response {
        send(router, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
