//! Application error types.
//!
//! One `thiserror` enum covers both per-call failures (surfaced to the MCP
//! client as `isError` results) and the fatal startup configuration failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification reported to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolNotFound,
    InvalidArguments,
    Timeout,
    ServiceUnavailable,
    ClientError,
    MalformedResponse,
    ConfigurationError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::ClientError => "client_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::ConfigurationError => "configuration_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error enum for the LightRAG MCP adapter.
#[derive(Error, Debug)]
pub enum Error {
    /// Tool is not in the filtered catalog.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments failed schema validation. One entry per offending field.
    #[error("invalid arguments: {}", .0.join("; "))]
    InvalidArguments(Vec<String>),

    /// Outbound call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Remote 5xx or network failure.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Remote 4xx.
    #[error("client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    /// Successful status with a body that could not be parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Startup-only, fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors (config file).
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error for the protocol envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Error::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::ServiceUnavailable(_) | Error::Io(_) => ErrorKind::ServiceUnavailable,
            Error::ClientError { .. } => ErrorKind::ClientError,
            Error::MalformedResponse(_) | Error::Serialization(_) => ErrorKind::MalformedResponse,
            Error::Configuration(_) | Error::Yaml(_) => ErrorKind::ConfigurationError,
        }
    }

    /// Message without the kind prefix, for the `<kind>: <message>` envelope.
    pub fn detail(&self) -> String {
        match self {
            Error::ToolNotFound(name) => format!("unknown or disabled tool '{}'", name),
            Error::InvalidArguments(errors) => errors.join("; "),
            Error::Timeout(msg)
            | Error::ServiceUnavailable(msg)
            | Error::MalformedResponse(msg)
            | Error::Configuration(msg) => msg.clone(),
            Error::ClientError { status, message } => format!("HTTP {}: {}", status, message),
            Error::Serialization(e) => e.to_string(),
            Error::Yaml(e) => e.to_string(),
            Error::Io(e) => e.to_string(),
        }
    }

    /// Whether this error ends the process rather than a single call.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::ConfigurationError
    }
}

// Convenience constructors
impl Error {
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(vec![msg.into()])
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn client_error(status: u16, msg: impl Into<String>) -> Self {
        Self::ClientError {
            status,
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs may carry the API key as a query parameter.
        let err = err.without_url();
        if err.is_timeout() {
            Error::timeout(err.to_string())
        } else if err.is_decode() {
            Error::malformed(err.to_string())
        } else {
            Error::service_unavailable(err.to_string())
        }
    }
}
