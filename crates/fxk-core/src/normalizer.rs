//! Response normalization for upstream API payloads
//!
//! The API wraps most answers in an envelope of the form
//! `{errorCode, errorMessage, errorDescription?, traceId?, data?, ...}` where
//! `errorCode == 0` means success, but some endpoints return bare payloads
//! and the auth endpoint puts its fields at the envelope's top level. This
//! module turns all of those into a [`Normalized`] result and classifies
//! failures.

use crate::error::{Error, ErrorKind};
use crate::response::Normalized;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// The upstream API's response envelope.
///
/// Only `errorCode` and `errorMessage` are structural. The metadata fields
/// are read leniently: numbers are stringified and other types dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope {
    pub error_code: i64,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Any other top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiEnvelope {
    /// Structural check: numeric `errorCode` and string `errorMessage`
    pub fn matches(raw: &Value) -> bool {
        raw.get("errorCode").is_some_and(Value::is_number)
            && raw.get("errorMessage").is_some_and(Value::is_string)
    }

    /// Decode an envelope from a raw payload.
    ///
    /// Fails only when `errorCode` is not an integer or `errorMessage` is
    /// not a string.
    pub fn from_value(raw: &Value) -> Result<Self, String> {
        let mut fields = raw
            .as_object()
            .cloned()
            .ok_or_else(|| "envelope is not a JSON object".to_string())?;

        let error_code = match fields.remove("errorCode") {
            Some(code) => integral_code(&code)
                .ok_or_else(|| format!("errorCode {} is not an integer", code))?,
            None => return Err("missing errorCode".to_string()),
        };
        let error_message = match fields.remove("errorMessage") {
            Some(Value::String(message)) => message,
            _ => return Err("errorMessage is not a string".to_string()),
        };

        Ok(Self {
            error_code,
            error_message,
            error_description: fields.remove("errorDescription").and_then(lenient_text),
            trace_id: fields.remove("traceId").and_then(lenient_text),
            data: fields.remove("data").filter(|d| !d.is_null()),
            extra: fields,
        })
    }

    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }

    /// Message used for failed envelopes
    pub fn failure_message(&self) -> String {
        format!("API Error ({}): {}", self.error_code, self.error_message)
    }

    /// Non-empty string field at the envelope's top level
    fn top_level_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Credentials returned by the authentication endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
    pub corp_id: String,
    /// Token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

/// Normalize an arbitrary payload.
///
/// Envelopes are unpacked; anything else (including `null`) is treated as an
/// opaque successful payload. This never fails: decode problems become a
/// failure result.
pub fn parse(raw: &Value) -> Normalized<Value> {
    if !ApiEnvelope::matches(raw) {
        trace!("Payload is not an API envelope, passing through");
        return Normalized::success(raw.clone());
    }

    match ApiEnvelope::from_value(raw) {
        Ok(envelope) => parse_envelope(envelope),
        Err(e) => {
            debug!(error = %e, "Failed to decode API envelope");
            Normalized::failure(format!("Failed to parse response: {}", e))
        }
    }
}

/// Normalize a decoded envelope: non-zero codes fail, zero yields `data`
pub fn parse_envelope(envelope: ApiEnvelope) -> Normalized<Value> {
    if envelope.is_success() {
        return Normalized::success(envelope.data.unwrap_or(Value::Null));
    }
    debug!(
        error_code = envelope.error_code,
        trace_id = envelope.trace_id.as_deref().unwrap_or(""),
        "API returned an error envelope"
    );
    envelope_failure(envelope)
}

fn envelope_failure<T>(envelope: ApiEnvelope) -> Normalized<T> {
    Normalized::Failure {
        error: envelope.failure_message(),
        error_code: Some(envelope.error_code),
        error_message: Some(envelope.error_message),
        status: None,
        kind: ErrorKind::Api,
        timestamp: Utc::now(),
    }
}

/// Normalize the authentication endpoint's flat response
pub fn parse_auth_response(raw: &Value) -> Normalized<AuthToken> {
    if !ApiEnvelope::matches(raw) {
        return Normalized::failure("Response is not in API format");
    }

    let envelope = match ApiEnvelope::from_value(raw) {
        Ok(envelope) => envelope,
        Err(e) => return Normalized::failure(format!("Failed to parse response: {}", e)),
    };

    if !envelope.is_success() {
        return envelope_failure(envelope);
    }

    let access_token = envelope
        .top_level_str("accessToken")
        .or_else(|| envelope.top_level_str("corpAccessToken"));
    let corp_id = envelope.top_level_str("corpId");

    match (access_token, corp_id) {
        (Some(access_token), Some(corp_id)) => Normalized::success(AuthToken {
            access_token: access_token.to_string(),
            corp_id: corp_id.to_string(),
            expires_in: envelope.extra.get("expiresIn").and_then(as_integer),
        }),
        (access_token, corp_id) => {
            let mut missing = Vec::new();
            if access_token.is_none() {
                missing.push("accessToken");
            }
            if corp_id.is_none() {
                missing.push("corpId");
            }
            Normalized::failure(format!(
                "Auth response missing required fields: {}",
                missing.join(", ")
            ))
        }
    }
}

/// Build a typed API error from an envelope.
///
/// Does not look at `errorCode`; callers check for failure first.
pub fn create_typed_error(envelope: &ApiEnvelope) -> Error {
    Error::Api {
        message: envelope.failure_message(),
        code: envelope.error_code,
        status_code: None,
        description: envelope.error_description.clone(),
        trace_id: envelope.trace_id.clone(),
    }
}

/// Whether the failure described by an envelope is transient
pub fn is_retryable(envelope: &ApiEnvelope) -> bool {
    if envelope.is_success() {
        return false;
    }
    create_typed_error(envelope).is_retryable()
}

/// `errorCode` as an integer; whole floats like `0.0` count
fn integral_code(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Metadata text: strings as-is, numbers stringified, anything else dropped
fn lenient_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer from a JSON number or numeric string
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
