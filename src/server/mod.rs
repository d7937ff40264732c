//! HTTP surface
//!
//! `GET /` reports service health, `POST /process-bottle/` runs the pipeline
//! on the multipart field `file`. Requests share one processor behind a
//! mutex and run on tokio's blocking pool, so images are processed one at a
//! time.

mod handlers;

use crate::config::ServerConfig;
use crate::processor::BottleProcessor;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use handlers::{health, process_bottle};

/// Route of the processing endpoint
pub const PROCESS_ROUTE: &str = "/process-bottle/";

/// Static service description returned by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub profile: String,
    pub output_format: String,
    pub extractor: String,
}

impl ServiceInfo {
    fn describe(processor: &BottleProcessor) -> Self {
        let config = processor.config();
        Self {
            status: "ok",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            profile: config.profile.to_string(),
            output_format: config.output_format.to_string(),
            extractor: processor.extractor_name(),
        }
    }
}

/// Shared state of the router
#[derive(Clone)]
pub struct AppState {
    pub(crate) processor: Arc<Mutex<BottleProcessor>>,
    pub(crate) info: Arc<ServiceInfo>,
}

impl AppState {
    #[must_use]
    pub fn new(processor: BottleProcessor) -> Self {
        let info = Arc::new(ServiceInfo::describe(&processor));
        Self {
            processor: Arc::new(Mutex::new(processor)),
            info,
        }
    }
}

/// Build the application router
pub fn router(processor: BottleProcessor, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(health))
        .route(PROCESS_ROUTE, post(process_bottle))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(AppState::new(processor))
}

/// Bind and serve until the process is stopped
///
/// # Errors
/// - Address already in use or invalid
/// - Server I/O failures
pub async fn serve(processor: BottleProcessor, config: ServerConfig) -> anyhow::Result<()> {
    use anyhow::Context;

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!(address = %config.bind_address, "Serving bottle pipeline");

    axum::serve(listener, router(processor, &config))
        .await
        .context("HTTP server failed")
}
