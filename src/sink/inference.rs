//! Client that forwards completed batches to a model inference service.

use crate::core::{Batch, BatchConsumer, PipelineError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Inference service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Service host (default: 127.0.0.1)
    pub host: String,
    /// Service port
    pub port: u16,
    /// Bearer authentication token
    #[serde(default)]
    pub token: Option<String>,
}

impl InferenceConfig {
    pub fn new(host: impl Into<String>, port: u16, token: Option<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token,
        }
    }

    /// Get the full service URL.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the prediction endpoint URL.
    pub fn predict_url(&self) -> String {
        format!("{}/v1/predict", self.url())
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

impl From<crate::config::InferenceSettings> for InferenceConfig {
    fn from(settings: crate::config::InferenceSettings) -> Self {
        Self::new(settings.host, settings.port, settings.token)
    }
}

/// Inference client error types.
#[derive(Debug)]
pub enum InferenceError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Request body could not be encoded
    Serialization(String),
    /// Service returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceError::Config(msg) => write!(f, "Inference config error: {msg}"),
            InferenceError::Network(msg) => write!(f, "Inference network error: {msg}"),
            InferenceError::Serialization(msg) => {
                write!(f, "Inference serialization error: {msg}")
            }
            InferenceError::Server { status, message } => {
                write!(f, "Inference server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for InferenceError {}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        PipelineError::Consumer(err.to_string())
    }
}

/// Request body for the prediction endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub batch_id: uuid::Uuid,
    pub machine: String,
    /// Sampling rate of the streams, in Hz
    pub sampling_rate: u32,
    pub vib_left: Vec<f64>,
    pub vib_right: Vec<f64>,
    pub temp: Vec<f64>,
}

impl InferenceRequest {
    pub fn from_batch(batch: Batch, sampling_rate: u32) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4(),
            machine: batch.machine,
            sampling_rate,
            vib_left: batch.vib_left,
            vib_right: batch.vib_right,
            temp: batch.temp,
        }
    }
}

/// Forwards batches to the inference service.
pub struct InferenceClient {
    config: InferenceConfig,
    client: reqwest::Client,
    sampling_rate: u32,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceConfig, sampling_rate: u32) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| InferenceError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            sampling_rate,
        })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Test connection to the service.
    pub async fn test_connection(&self) -> Result<bool, InferenceError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Send one batch to the prediction endpoint.
    pub async fn predict(&self, batch: Batch) -> Result<(), InferenceError> {
        let request = InferenceRequest::from_batch(batch, self.sampling_rate);
        let body = serde_json::to_vec(&request)
            .map_err(|e| InferenceError::Serialization(e.to_string()))?;

        let mut builder = self
            .client
            .post(self.config.predict_url())
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(ref token) = self.config.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InferenceError::Server {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(batch_id = %request.batch_id, machine = %request.machine, "Batch accepted");
        Ok(())
    }
}

#[async_trait]
impl BatchConsumer for InferenceClient {
    async fn consume(&self, batch: Batch) -> Result<(), PipelineError> {
        self.predict(batch).await.map_err(|e| {
            tracing::error!("Failed to forward batch: {}", e);
            PipelineError::from(e)
        })
    }
}


#[cfg(all(test, feature = "server"))]
mod service_tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    /// Stand-in prediction service answering every request with `status`.
    struct PredictService {
        status: StatusCode,
        authorization: Mutex<Option<String>>,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    async fn predict(
        State(service): State<Arc<PredictService>>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, String) {
        *service.authorization.lock().unwrap() = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        service.requests.lock().unwrap().push(body);
        (service.status, "model overloaded".to_string())
    }

    async fn spawn_service(status: StatusCode) -> (u16, Arc<PredictService>) {
        let service = Arc::new(PredictService {
            status,
            authorization: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/predict", post(predict))
            .with_state(service.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (port, service)
    }

    fn batch() -> Batch {
        Batch {
            machine: "machine2".to_string(),
            vib_left: vec![0.5, 0.25],
            vib_right: vec![1.0, 2.0],
            temp: vec![40.0, 41.0],
        }
    }

    #[tokio::test]
    async fn test_predict_accepted_with_bearer_token() {
        let (port, service) = spawn_service(StatusCode::OK).await;
        let config = InferenceConfig::new("127.0.0.1", port, Some("secret".to_string()));
        let client = InferenceClient::new(config, 2000).unwrap();

        client.predict(batch()).await.unwrap();

        assert_eq!(
            service.authorization.lock().unwrap().as_deref(),
            Some("Bearer secret")
        );
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["machine"], "machine2");
        assert_eq!(requests[0]["sampling_rate"], 2000);
        assert_eq!(requests[0]["vib_left"][1], 0.25);
    }

    #[tokio::test]
    async fn test_predict_without_token_sends_no_authorization() {
        let (port, service) = spawn_service(StatusCode::OK).await;
        let client = InferenceClient::new(InferenceConfig::new("127.0.0.1", port, None), 1000)
            .unwrap();

        client.predict(batch()).await.unwrap();
        assert!(service.authorization.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_predict_service_unavailable_is_server_error() {
        let (port, _service) = spawn_service(StatusCode::SERVICE_UNAVAILABLE).await;
        let config = InferenceConfig::new("127.0.0.1", port, Some("secret".to_string()));
        let client = InferenceClient::new(config, 1000).unwrap();

        let err = client.predict(batch()).await.unwrap_err();
        match err {
            InferenceError::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "model overloaded");
            }
            other => panic!("expected server error, got {other:?}"),
        }

        let err = client.consume(batch()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Consumer(ref msg) if msg.contains("503")));
    }
}
