//! Logging setup for the fxk CLI
//!
//! This module provides:
//! - Subscriber setup with compact, full and JSON formats
//! - Optional file output through a non-blocking appender
//! - A request id for the whole invocation
//! - Secret redaction for anything derived from profiles
//! - Timing spans

use crate::error::{Error, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{field, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};
use uuid::Uuid;

/// Global request ID for the current invocation
static REQUEST_ID: OnceLock<String> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: String,
    pub format: LogFormat,
    /// Enable console output (stderr)
    pub console: bool,
    /// Optional file output path
    pub file: Option<PathBuf>,
    pub thread_ids: bool,
    /// Include file and line numbers
    pub source_location: bool,
    /// Log span open/close events
    pub span_events: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            console: true,
            file: None,
            thread_ids: false,
            source_location: false,
            span_events: false,
        }
    }
}

impl LoggingConfig {
    /// Create logging config from verbosity level
    pub fn from_verbosity(verbosity: u8) -> Self {
        let mut config = Self::default();

        match verbosity {
            0 => {}
            1 => {
                config.level = "info".to_string();
            }
            2 => {
                config.level = "debug".to_string();
                config.source_location = true;
            }
            _ => {
                config.level = "trace".to_string();
                config.format = LogFormat::Full;
                config.source_location = true;
                config.thread_ids = true;
                config.span_events = true;
            }
        }

        config
    }

    /// Apply `RUST_LOG` and `FXK_LOG_*` overrides from the environment
    pub fn merge_with_env(&mut self) {
        self.merge_with(|name| std::env::var(name).ok());
    }

    fn merge_with(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(rust_log) = var("RUST_LOG") {
            self.level = rust_log;
        }

        if let Some(format) = var("FXK_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "compact" => self.format = LogFormat::Compact,
                "full" => self.format = LogFormat::Full,
                "json" => self.format = LogFormat::Json,
                _ => eprintln!("Invalid FXK_LOG_FORMAT '{}', using default", format),
            }
        }

        if let Some(file) = var("FXK_LOG_FILE").filter(|f| !f.is_empty()) {
            self.file = Some(PathBuf::from(file));
        }

        if let Some(console) = var("FXK_LOG_CONSOLE") {
            self.console = console.to_lowercase() == "true" || console == "1";
        }
    }
}

/// Initialize the global logging system.
///
/// The returned guard flushes file output when dropped and must be held
/// until the process is about to exit.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.level)
        .map_err(|e| Error::other(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.console {
        let ansi = config.format != LogFormat::Json && std::io::stderr().is_terminal();
        layers.push(format_layer(&config, std::io::stderr, ansi));
    }

    let guard = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            layers.push(format_layer(&config, writer, false));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| Error::other(format!("Failed to initialize logging: {}", e)))?;

    let request_id = REQUEST_ID.get_or_init(generate_request_id);
    tracing::info!(
        request_id = %request_id,
        level = %config.level,
        format = ?config.format,
        file = ?config.file,
        "Logging system initialized"
    );

    Ok(guard)
}

fn format_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(config.thread_ids)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Full => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::other(format!("Invalid log file path: {}", path.display())))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Generate a unique request ID for this invocation
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// Get the current request ID
pub fn current_request_id() -> Option<&'static str> {
    REQUEST_ID.get().map(|s| s.as_str())
}

/// Create a span with request ID and timing
pub fn create_operation_span(operation: &str, details: Option<&str>) -> Span {
    tracing::info_span!(
        "operation",
        operation = operation,
        request_id = current_request_id().unwrap_or("unknown"),
        details = details.unwrap_or(""),
        duration_ms = field::Empty,
    )
}

/// Sensitive data redaction utilities
pub mod redaction {
    use regex::Regex;
    use serde_json::Value;
    use std::sync::OnceLock;

    static CREDENTIAL_REGEX: OnceLock<Regex> = OnceLock::new();

    /// Key suffixes (lowercased, separators removed) whose values are secret
    const SENSITIVE_SUFFIXES: [&str; 5] = ["secret", "token", "permanentcode", "password", "apikey"];

    /// Placeholder written in place of secrets
    pub const MASK: &str = "***";

    fn credential_regex() -> &'static Regex {
        CREDENTIAL_REGEX.get_or_init(|| {
            Regex::new(
                r#"(?i)((?:app[_-]?secret|permanent[_-]?code|(?:corp)?access[_-]?token|password)["']?\s*[=:]\s*["']?)([^\s"',}&]+)"#,
            )
            .expect("credential pattern is valid")
        })
    }

    /// Redact credential assignments (`appSecret=...`, `"accessToken":"..."`) in free text
    pub fn redact_sensitive(input: &str) -> String {
        credential_regex()
            .replace_all(input, format!("${{1}}{}", MASK).as_str())
            .into_owned()
    }

    /// Mask sensitive fields of a JSON document in place
    pub fn redact_json_value(value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    if is_sensitive_key(key) && !val.is_null() {
                        *val = Value::String(MASK.to_string());
                    } else {
                        redact_json_value(val);
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(redact_json_value),
            Value::String(s) => *s = redact_sensitive(s),
            _ => {}
        }
    }

    /// Whether a profile or payload key holds a secret
    pub fn is_sensitive_key(key: &str) -> bool {
        let normalized: String = key
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        SENSITIVE_SUFFIXES.iter().any(|s| normalized.ends_with(s))
    }
}

/// Performance timing utilities
pub mod timing {
    use std::time::Instant;
    use tracing::Span;

    /// A timer that logs its duration when dropped
    pub struct Timer {
        start: Instant,
        span: Span,
        operation: String,
    }

    impl Timer {
        pub fn new(operation: &str) -> Self {
            Self {
                start: Instant::now(),
                span: super::create_operation_span(operation, None),
                operation: operation.to_string(),
            }
        }

        pub fn with_details(operation: &str, details: &str) -> Self {
            Self {
                start: Instant::now(),
                span: super::create_operation_span(operation, Some(details)),
                operation: operation.to_string(),
            }
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            let duration = self.start.elapsed();
            self.span.record("duration_ms", duration.as_millis() as u64);

            tracing::debug!(
                operation = %self.operation,
                duration_ms = duration.as_millis() as u64,
                "Operation completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_redaction() {
        let input = r#"appSecret=abc123 permanent_code: "P-9" accessToken":"tok.value" corpId=keep"#;
        let redacted = redaction::redact_sensitive(input);
        assert!(redacted.contains("appSecret=***"));
        assert!(redacted.contains("permanent_code: \"***"));
        assert!(!redacted.contains("abc123"));
        assert!(!redacted.contains("P-9"));
        assert!(!redacted.contains("tok.value"));
        assert!(redacted.contains("corpId=keep"));
    }

    #[test]
    fn test_json_redaction() {
        let mut value = json!({
            "name": "default",
            "appId": "FSAID_1",
            "appSecret": "s3cret",
            "permanentCode": "perm",
            "accessToken": "tok",
            "tokenExpiry": 1700000000000i64,
            "nested": {"corp_access_token": "tok2"},
            "lookupKey": null
        });

        redaction::redact_json_value(&mut value);

        assert_eq!(value["appId"], "FSAID_1");
        assert_eq!(value["appSecret"], "***");
        assert_eq!(value["permanentCode"], "***");
        assert_eq!(value["accessToken"], "***");
        assert_eq!(value["tokenExpiry"], 1700000000000i64);
        assert_eq!(value["nested"]["corp_access_token"], "***");
    }

    #[test]
    fn test_logging_config_from_verbosity() {
        let config = LoggingConfig::from_verbosity(0);
        assert_eq!(config.level, "warn");
        assert!(!config.source_location);

        let config = LoggingConfig::from_verbosity(2);
        assert_eq!(config.level, "debug");
        assert!(config.source_location);

        let config = LoggingConfig::from_verbosity(3);
        assert_eq!(config.level, "trace");
        assert_eq!(config.format, LogFormat::Full);
        assert!(config.thread_ids);
        assert!(config.span_events);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RUST_LOG", "fxk_core=trace"),
            ("FXK_LOG_FORMAT", "JSON"),
            ("FXK_LOG_FILE", "/tmp/fxk.log"),
            ("FXK_LOG_CONSOLE", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = LoggingConfig::default();
        config.merge_with(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.level, "fxk_core=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/fxk.log")));
        assert!(!config.console);
    }

    #[test]
    fn test_request_id_shape() {
        let id = generate_request_id();
        assert!(id.starts_with("req_"));
        assert_eq!(id.len(), 4 + 32);
    }
}
