//! Uniform result type shared by every operation
//!
//! Whatever shape the upstream API answers with, callers only ever see a
//! [`Normalized`] value: a success carrying data, or a failure carrying a
//! human-readable message and whatever structured metadata was available.

use crate::error::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status reported for successful payloads
pub const SUCCESS_STATUS: u16 = 200;

/// Tagged success/failure result produced by the normalization layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Normalized<T> {
    #[serde(rename_all = "camelCase")]
    Success {
        data: T,
        status: u16,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        kind: ErrorKind,
        timestamp: DateTime<Utc>,
    },
}

impl<T> Normalized<T> {
    /// Successful result with status 200
    pub fn success(data: T) -> Self {
        Self::Success {
            data,
            status: SUCCESS_STATUS,
            timestamp: Utc::now(),
        }
    }

    /// Failure with only a message, attributed to the upstream API
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            error_code: None,
            error_message: None,
            status: None,
            kind: ErrorKind::Api,
            timestamp: Utc::now(),
        }
    }

    /// Failure derived from a typed error, keeping its message verbatim
    pub fn from_error(error: &Error) -> Self {
        let error_code = match error {
            Error::Api { code, .. } => Some(*code),
            _ => None,
        };
        Self::Failure {
            error: error.to_string(),
            error_code,
            error_message: None,
            status: error.status_code(),
            kind: error.kind(),
            timestamp: Utc::now(),
        }
    }

    pub fn from_result(result: crate::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::from_error(&e),
        }
    }

    /// Convert back into a `Result`, rebuilding a typed error for failures
    pub fn into_result(self) -> crate::Result<T> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Failure {
                error,
                error_code,
                status,
                kind,
                ..
            } => Err(match kind {
                ErrorKind::Api => Error::Api {
                    message: error,
                    code: error_code.or(status.map(i64::from)).unwrap_or_default(),
                    status_code: status,
                    description: None,
                    trace_id: None,
                },
                ErrorKind::Auth => Error::Auth {
                    message: error,
                    status_code: status,
                },
                ErrorKind::Config => Error::Config { message: error },
                ErrorKind::Network => Error::Network { message: error },
                ErrorKind::Validation => Error::Validation {
                    message: error,
                    field: None,
                    value: None,
                },
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Kind of the failure, if this is one
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Transform the success payload, leaving failures untouched
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Normalized<U> {
        match self {
            Self::Success {
                data,
                status,
                timestamp,
            } => Normalized::Success {
                data: f(data),
                status,
                timestamp,
            },
            Self::Failure {
                error,
                error_code,
                error_message,
                status,
                kind,
                timestamp,
            } => Normalized::Failure {
                error,
                error_code,
                error_message,
                status,
                kind,
                timestamp,
            },
        }
    }
}
