//! HTTP transport to the RAG backend: `POST /ask` and `GET /health`.
//! One request per call; retrying is the caller's business.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::errors::TransportError;
use crate::messages::{AskRequest, HealthStatus, RetrievalParameters};

/// Upper bound on a single backend call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can put one question to the backend.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Sends the question once. Returns the raw JSON payload of a 2xx response; shape
    /// checking happens in [`crate::messages::AnswerResponse::from_json`].
    async fn ask(&self, query: &str, params: &RetrievalParameters)
        -> Result<Value, TransportError>;

    /// Backend liveness check.
    async fn health_check(&self) -> Result<HealthStatus, TransportError>;
}

/// [`TransportClient`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Client for `base_url` (e.g. `http://localhost:8000`) with the default 30 s timeout.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn ask(
        &self,
        query: &str,
        params: &RetrievalParameters,
    ) -> Result<Value, TransportError> {
        let url = self.endpoint("ask");
        debug!("POST {} (top_k={}, threshold={})", url, params.top_k, params.threshold);

        let response = self
            .client
            .post(&url)
            .json(&AskRequest::new(query, params))
            .send()
            .await
            .map_err(classify)?;
        let response = check_status(response).await?;

        let text = response.text().await.map_err(classify)?;
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Left for response validation to reject.
                debug!("Response body is not JSON: {}", e);
                Ok(Value::String(text))
            }
        }
    }

    async fn health_check(&self) -> Result<HealthStatus, TransportError> {
        let url = self.endpoint("health");
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(classify)?;
        let response = check_status(response).await?;

        let text = response.text().await.map_err(classify)?;
        serde_json::from_str(&text).map_err(|e| TransportError::Request {
            message: format!("invalid health payload: {e}"),
        })
    }
}

/// Builder failures are local; anything else from reqwest means no usable response arrived.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::Request {
            message: e.to_string(),
        }
    } else {
        TransportError::Network {
            message: e.to_string(),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Server {
        status: status.as_u16(),
        message: server_message(status, &body),
    })
}

/// `error` from the body, then FastAPI's `detail`, then the reason phrase.
fn server_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    field("error")
        .or_else(|| field("detail"))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}
