//! Attendance Server
//!
//! Main entry point.

use attendance_server::{
    detector::{Detector, HttpDetector},
    state::{AppConfig, AppState},
    summary_sink::{MySqlSummarySink, SummarySink},
    web_api,
};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting attendance server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        detector_url = %config.detector_url,
        detector_timeout_ms = config.detector_timeout.as_millis(),
        sink_timeout_ms = config.sink_timeout.as_millis(),
        sink_max_attempts = config.sink_max_attempts,
        person_label = %config.person_label,
        "Configuration loaded"
    );
    if config.host_token.is_none() {
        tracing::warn!("HOST_TOKEN not set - session-wide attendance queries will be rejected");
    }

    // Create database pool
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;

    tracing::info!("Database connected");

    let sink = MySqlSummarySink::new(pool);
    sink.ensure_schema().await?;
    let sink: Arc<dyn SummarySink> = Arc::new(sink);

    let detector: Arc<dyn Detector> = Arc::new(HttpDetector::new(
        config.detector_url.clone(),
        config.detector_timeout,
    )?);
    tracing::info!("Detector client initialized");

    let state = AppState::new(config, detector, sink);

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
