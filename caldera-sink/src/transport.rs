//! Delivery transports for batch payloads
//!
//! The client hands every due batch to a [`Transport`]. Live mode uses
//! [`HttpTransport`]; dry-run mode substitutes [`NoopTransport`], which runs
//! the identical code path but performs no I/O. The transport is selected
//! once, at client construction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{TrackEvent, UserRecord};

/// Request body for POST /users/track
///
/// One payload shape serves both kinds; the client fills exactly one list per
/// flush and the other is omitted from the JSON.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<UserRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<TrackEvent>>,
}

impl BatchPayload {
    /// Total objects across both lists
    pub fn object_count(&self) -> usize {
        self.attributes.as_deref().map_or(0, |a| a.len())
            + self.events.as_deref().map_or(0, |e| e.len())
    }

    /// Whether the payload carries no objects at all
    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }
}

/// Response from POST /users/track
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackResponse {
    /// Number of user-attribute objects the platform processed
    #[serde(default)]
    pub attributes_processed: usize,
    /// Number of event objects the platform processed
    #[serde(default)]
    pub events_processed: usize,
    /// Human-readable status from the platform
    #[serde(default)]
    pub message: Option<String>,
}

/// Capability of delivering one batch payload to the platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a batch, returning the platform's accounting of it.
    ///
    /// Errors must leave the caller free to resend the same payload.
    async fn deliver(&self, payload: &BatchPayload) -> Result<TrackResponse>;
}

/// Build a reqwest client with bearer auth and JSON content type baked in.
pub(crate) fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let auth_value = format!("Bearer {}", config.api_key);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&auth_value)
            .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
    );

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))
}

/// Live HTTP transport for the Caldera bulk endpoint
#[derive(Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport from configuration.
    ///
    /// Returns an error if the API key cannot form a valid header value.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.endpoint.trim_end_matches('/').to_string();
        let http_client = build_http_client(config)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, payload: &BatchPayload) -> Result<TrackResponse> {
        let url = format!("{}/users/track", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: TrackResponse = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))?;
            Ok(result)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Dry-run transport: performs no I/O, records what would have been sent.
///
/// Every payload handed to it is kept for inspection via [`recorded`] and
/// logged at debug level, so a dry run reports exactly what a live run would
/// have posted.
///
/// [`recorded`]: NoopTransport::recorded
#[derive(Debug, Default)]
pub struct NoopTransport {
    recorded: Mutex<Vec<BatchPayload>>,
}

impl NoopTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads handed to this transport so far, in delivery order
    pub async fn recorded(&self) -> Vec<BatchPayload> {
        self.recorded.lock().await.clone()
    }
}

#[async_trait]
impl Transport for NoopTransport {
    async fn deliver(&self, payload: &BatchPayload) -> Result<TrackResponse> {
        tracing::debug!(
            objects = payload.object_count(),
            payload = %serde_json::to_string(payload).unwrap_or_default(),
            "Dry run, skipping delivery"
        );

        let response = TrackResponse {
            attributes_processed: payload.attributes.as_deref().map_or(0, |a| a.len()),
            events_processed: payload.events.as_deref().map_or(0, |e| e.len()),
            message: Some("dry-run".to_string()),
        };

        self.recorded.lock().await.push(payload.clone());

        Ok(response)
    }
}
