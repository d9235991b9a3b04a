//! Error types for the fxk core library
//!
//! Every failure that crosses a component boundary is one of five kinds.
//! Each kind carries a stable code and an operational flag: operational
//! errors are expected, user-facing conditions (bad input, upstream business
//! errors, missing credentials), while non-operational errors point at an
//! unexpected environment fault.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upstream error codes (and HTTP statuses) that indicate a transient failure.
pub const RETRYABLE_CODES: [i64; 7] = [10001, 10002, 10003, 500, 502, 503, 504];

/// Code carried by API errors raised locally when a success response lacks
/// a required field. Never a real upstream code, and never retryable.
pub const MALFORMED_RESPONSE_CODE: i64 = -1;

/// Main error type for fxk operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Business error reported by the upstream API, or a non-2xx response
    #[error("{message}")]
    Api {
        message: String,
        /// Upstream `errorCode`, or the HTTP status for transport-level failures
        code: i64,
        status_code: Option<u16>,
        description: Option<String>,
        trace_id: Option<String>,
    },

    /// Authentication rejected or not possible
    #[error("{message}")]
    Auth {
        message: String,
        status_code: Option<u16>,
    },

    /// Local configuration or profile state error
    #[error("{message}")]
    Config { message: String },

    /// Transport-level failure; the request never produced a response
    #[error("{message}")]
    Network { message: String },

    /// Bad local input
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`], used where only the kind matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Api,
    Auth,
    Config,
    Network,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Api => write!(f, "api"),
            ErrorKind::Auth => write!(f, "auth"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Validation => write!(f, "validation"),
        }
    }
}

impl ErrorKind {
    /// Whether errors of this kind are expected, recoverable conditions
    pub fn is_operational(&self) -> bool {
        !matches!(self, ErrorKind::Network)
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error without a status code
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a validation error tied to a field
    pub fn validation(
        message: impl Into<String>,
        field: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            value,
        }
    }

    /// Create an API error from an upstream code and message
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code,
            status_code: None,
            description: None,
            trace_id: None,
        }
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { .. } => ErrorKind::Api,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Config { .. } => ErrorKind::Config,
            Self::Network { .. } => ErrorKind::Network,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Stable machine-readable code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Api { .. } => "API_ERROR",
            Self::Auth { .. } => "AUTH_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
        }
    }

    /// HTTP status associated with this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } | Self::Auth { status_code, .. } => *status_code,
            Self::Validation { .. } => Some(400),
            _ => None,
        }
    }

    pub fn is_operational(&self) -> bool {
        self.kind().is_operational()
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Only API errors are ever retryable, and only for the fixed set of
    /// codes in [`RETRYABLE_CODES`].
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { code, .. } => is_retryable_code(*code),
            _ => false,
        }
    }

    /// Prefix the message with context, keeping kind and metadata intact
    pub fn with_context(mut self, context: &str) -> Self {
        let message = match &mut self {
            Self::Api { message, .. }
            | Self::Auth { message, .. }
            | Self::Config { message }
            | Self::Network { message }
            | Self::Validation { message, .. } => message,
        };
        *message = format!("{}: {}", context, message);
        self
    }
}

/// Exact-match lookup against the retryable code table
pub fn is_retryable_code(code: i64) -> bool {
    RETRYABLE_CODES.contains(&code)
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config {
            message: format!("Invalid JSON: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}
