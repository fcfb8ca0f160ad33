use clinic_errors::{ErrDef, FailureKind, Problem, Rejection, ValidationViolation};
use std::time::Duration;
use thiserror::Error;

/// Gateway error types
///
/// Every variant classifies into exactly one [`FailureKind`] via
/// [`GatewayError::kind`]. Callers normally branch on the kind rather than on
/// the variant.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// Base URL could not be used
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// Base URL scheme not allowed by the transport security mode
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },

    /// Descriptor path could not be resolved against the base URL
    #[error("invalid request path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Request building failed
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request body could not be encoded
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Single attempt timed out
    #[error("request attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (network, connection, etc)
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Internal service failure (buffer worker died, channel closed)
    #[error("gateway unavailable: internal failure")]
    ServiceClosed,

    /// No response was received on any attempt
    #[error("backend unreachable after {attempts} attempt(s): {last}")]
    ConnectionFailure {
        attempts: usize,
        #[source]
        last: Box<GatewayError>,
    },

    /// The backend answered with a non-success, non-5xx status
    #[error("HTTP {status} {}: {}", .rejection.as_str(), .message.as_deref().unwrap_or("no message"))]
    Rejected {
        rejection: Rejection,
        status: u16,
        message: Option<String>,
        violations: Vec<ValidationViolation>,
    },

    /// The backend answered with a 5xx
    #[error("HTTP {status} server fault: {}", .message.as_deref().unwrap_or("no message"))]
    ServerFault { status: u16, message: Option<String> },

    /// Response body exceeded size limit
    #[error("response body too large: limit {limit} bytes (HTTP {status})")]
    BodyTooLarge { status: u16, limit: usize },

    /// A JSON-typed success body did not parse
    #[error("HTTP {status} body is not valid JSON: {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidBaseUrl { .. }
            | Self::InvalidScheme { .. }
            | Self::InvalidPath { .. }
            | Self::RequestBuild(_)
            | Self::InvalidHeaderName(_)
            | Self::InvalidHeaderValue(_)
            | Self::Json(_) => FailureKind::InvalidInput,
            Self::Tls(_)
            | Self::Timeout(_)
            | Self::Transport(_)
            | Self::ServiceClosed
            | Self::ConnectionFailure { .. } => FailureKind::ConnectionFailure,
            Self::Rejected { rejection, .. } => FailureKind::ClientRejection(*rejection),
            Self::ServerFault { .. } | Self::BodyTooLarge { .. } | Self::Decode { .. } => {
                FailureKind::ServerFault
            }
        }
    }

    /// HTTP status of the response, `0` when none was received.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Rejected { status, .. }
            | Self::ServerFault { status, .. }
            | Self::BodyTooLarge { status, .. }
            | Self::Decode { status, .. } => *status,
            _ => 0,
        }
    }

    /// Message provided by the backend, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } | Self::ServerFault { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// Whether the current session must be cleared and the user sent back to sign-in.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        self.kind().requires_reauthentication()
    }

    /// Whether this error came out of an attempt that may succeed if repeated.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }

    /// Render as a problem for the presentation layer.
    #[must_use]
    pub fn to_problem(&self) -> Problem {
        let kind = self.kind();
        let def = ErrDef::for_kind(kind);
        match self {
            Self::Rejected {
                status,
                message,
                violations,
                ..
            } => def
                .as_problem(kind, *status, message.clone().unwrap_or_default())
                .with_errors(violations.clone()),
            Self::ServerFault { status, message } => {
                def.as_problem(kind, *status, message.clone().unwrap_or_default())
            }
            Self::ConnectionFailure { .. } | Self::ServiceClosed => {
                def.as_problem(kind, 0, String::new())
            }
            other => def.as_problem(kind, other.status(), other.to_string()),
        }
    }
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        GatewayError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for GatewayError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        GatewayError::Transport(Box::new(err))
    }
}
