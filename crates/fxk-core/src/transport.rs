//! HTTP transport for upstream API calls
//!
//! [`Transport`] is the seam the auth flow and resource operations talk to.
//! [`HttpTransport`] implements it on top of reqwest, configured per profile
//! with a base URL, timeout and user agent. Failures come back in one of three
//! shapes so callers can tell a server-side rejection from a request that
//! never got an answer or never left the machine.

use crate::endpoints::DEFAULT_BASE_URL;
use crate::error::Error;
use crate::normalizer::ApiEnvelope;
use crate::profile::{Config, Profile};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The server responded with a non-2xx status
    #[error("Request failed with status {status}: {}", summarize_body(.body))]
    Status { status: u16, body: Value },

    /// The request was sent but no response arrived
    #[error("No response received from server: {0}")]
    NoResponse(String),

    /// The request could not be constructed or sent
    #[error("Request could not be sent: {0}")]
    Request(String),
}

fn summarize_body(body: &Value) -> String {
    if ApiEnvelope::matches(body) {
        if let Ok(envelope) = ApiEnvelope::from_value(body) {
            return envelope.failure_message();
        }
    }
    match body {
        Value::Null => "empty response body".to_string(),
        Value::String(s) => s.chars().take(200).collect(),
        other => other.to_string().chars().take(200).collect(),
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        let message = err.to_string();
        match err {
            TransportError::Status { status, .. } if status == 401 || status == 403 => {
                Error::Auth {
                    message,
                    status_code: Some(status),
                }
            }
            TransportError::Status { status, body } => {
                let envelope = ApiEnvelope::matches(&body)
                    .then(|| ApiEnvelope::from_value(&body).ok())
                    .flatten()
                    .filter(|e| !e.is_success());
                match envelope {
                    Some(envelope) => Error::Api {
                        message,
                        code: envelope.error_code,
                        status_code: Some(status),
                        description: envelope.error_description,
                        trace_id: envelope.trace_id,
                    },
                    None => Error::Api {
                        message,
                        code: i64::from(status),
                        status_code: Some(status),
                        description: None,
                        trace_id: None,
                    },
                }
            }
            TransportError::NoResponse(_) => Error::Network { message },
            TransportError::Request(_) => Error::Config { message },
        }
    }
}

/// Something that can exchange JSON with the upstream API
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request to `path` (relative to the base URL) and return the
    /// decoded body of a 2xx response
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.send(Method::GET, path, None).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, TransportError> {
        self.send(Method::DELETE, path, None).await
    }
}

/// Connection settings for [`HttpTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl TransportConfig {
    /// Settings for a profile, falling back to the config-wide defaults
    pub fn from_profile(profile: &Profile, config: &Config) -> Self {
        let base_url = profile
            .base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_ms = profile.timeout.unwrap_or(config.default_timeout);

        Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> crate::Result<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            Error::config(format!("Invalid base URL '{}': {}", config.base_url, e))
        })?;

        let mut builder = ReqwestClient::builder().user_agent(config.user_agent.clone());
        // a zero timeout means no timeout
        if !config.timeout.is_zero() {
            builder = builder.timeout(config.timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Transport for a profile, see [`TransportConfig::from_profile`]
    pub fn from_profile(profile: &Profile, config: &Config) -> crate::Result<Self> {
        Self::new(TransportConfig::from_profile(profile, config))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| TransportError::Request(format!("invalid URL '{}': {}", joined, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url_for(path)?;
        debug!(%method, %url, "Sending request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status();
        debug!(%method, %url, %status, "Received response");

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::NoResponse(format!("failed to read response body: {}", e)))?;
        let body = decode_body(&text);

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

fn classify_request_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::NoResponse(err.to_string())
    }
}

/// Empty bodies decode as `null`, non-JSON bodies as a JSON string
fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
