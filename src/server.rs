//! HTTP server for receiving sensor readings.
//!
//! This module provides an HTTP server that:
//! - Accepts vibration readings via POST /vibration
//! - Accepts temperature readings via POST /temperature
//! - Routes both through a shared [`DataController`]
//!
//! # Architecture
//!
//! ```text
//! Sensor gateway ──→ POST /vibration ──→ DataController ──→ inference service
//!                    POST /temperature        ↓
//!                                     [hourly averages]
//! ```
//!
//! The controller sits behind a single async mutex, so readings for both
//! machines are applied one message at a time in arrival order.

use crate::agent::{consumer_from_config, controller_from_config};
use crate::config::Config;
use crate::core::{
    DataController, PersistenceSink, PipelineError, TemperatureMessage, VibrationMessage,
};
use crate::counters::{IngestCounters, IngestStats};
use crate::sink::JsonlStore;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Agent configuration used to build the pipeline
    pub agent: Config,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, agent: Config) -> Self {
        Self { port, agent }
    }
}

/// Shared server state
pub struct ServerState {
    /// Ingest pipeline
    controller: Mutex<DataController>,
    /// Ingest counters
    counters: IngestCounters,
}

impl ServerState {
    /// Create new server state
    pub fn new(controller: DataController) -> Self {
        Self {
            controller: Mutex::new(controller),
            counters: IngestCounters::new(),
        }
    }

    /// Build state from the agent configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let consumer = consumer_from_config(config)?;
        let sink: Option<Arc<dyn PersistenceSink>> = if config.hourly_statistics {
            Some(Arc::new(JsonlStore::in_dir(&config.data_path)))
        } else {
            None
        };
        let controller = controller_from_config(config, consumer, sink)?;
        Ok(Self::new(controller))
    }
}

/// Response from ingest endpoints
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub status: String,
    /// Batches dispatched while handling this message
    pub batches_dispatched: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: &PipelineError) -> ApiError {
    let status = match err {
        PipelineError::MissingField(_) => StatusCode::BAD_REQUEST,
        PipelineError::Consumer(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Persistence(_) | PipelineError::EmptyAggregate => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status
async fn status(State(state): State<Arc<ServerState>>) -> Json<IngestStats> {
    Json(state.counters.snapshot())
}

/// POST /vibration
///
/// The message is validated before the controller is touched, so a request
/// missing any key changes no buffers.
async fn vibration(
    State(state): State<Arc<ServerState>>,
    Json(message): Json<VibrationMessage>,
) -> Result<Json<IngestResponse>, ApiError> {
    if let Err(e) = message.validate() {
        state.counters.record_rejected();
        return Err(error_response(&e));
    }

    let result = state.controller.lock().await.add_vib(&message).await;
    match result {
        Ok(batches) => {
            state.counters.record_vibration(batches);
            Ok(Json(IngestResponse {
                status: "ok".to_string(),
                batches_dispatched: batches,
            }))
        }
        Err(e) => {
            tracing::error!("Vibration message failed: {}", e);
            state.counters.record_rejected();
            Err(error_response(&e))
        }
    }
}

/// POST /temperature
async fn temperature(
    State(state): State<Arc<ServerState>>,
    Json(message): Json<TemperatureMessage>,
) -> Result<Json<IngestResponse>, ApiError> {
    if let Err(e) = message.validate() {
        state.counters.record_rejected();
        return Err(error_response(&e));
    }

    let result = state.controller.lock().await.add_temp(&message).await;
    match result {
        Ok(batches) => {
            state.counters.record_temperature(batches);
            Ok(Json(IngestResponse {
                status: "ok".to_string(),
                batches_dispatched: batches,
            }))
        }
        Err(e) => {
            tracing::error!("Temperature message failed: {}", e);
            state.counters.record_rejected();
            Err(error_response(&e))
        }
    }
}

/// Build the router over existing state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/vibration", post(vibration))
        .route("/temperature", post(temperature))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::from_config(&config.agent)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Machine monitor listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
