//! Outcome classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-classification of a 4xx response from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// 401: the session is missing or no longer valid
    AuthenticationRequired,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 422: the backend refused the payload
    ValidationFailed,
    /// Any other non-2xx, non-5xx status
    Other,
}

impl Rejection {
    /// Map a client-error status to its rejection.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::AuthenticationRequired,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::ValidationFailed,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ValidationFailed => "validation_failed",
            Self::Other => "client_error",
        }
    }
}

/// The kind of every terminal failure, whichever component produced it.
///
/// Callers match on this exhaustively to decide what to show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rejection", rename_all = "snake_case")]
pub enum FailureKind {
    /// No response was ever received (timeouts or transport faults after all retries)
    ConnectionFailure,
    /// The backend answered with a 4xx (or another non-success, non-5xx status)
    ClientRejection(Rejection),
    /// The backend answered with a 5xx
    ServerFault,
    /// The caller supplied something unusable; nothing was computed or sent
    InvalidInput,
}

impl FailureKind {
    /// Classify a received HTTP status.
    ///
    /// Returns `None` for 2xx statuses, which are not failures.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            500.. => Some(Self::ServerFault),
            _ => Some(Self::ClientRejection(Rejection::from_status(status))),
        }
    }

    /// Whether this failure should end the current session.
    #[must_use]
    pub fn requires_reauthentication(self) -> bool {
        matches!(
            self,
            Self::ClientRejection(Rejection::AuthenticationRequired)
        )
    }

    /// Stable snake-case label used in logs and problem codes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionFailure => "connection_failure",
            Self::ClientRejection(rejection) => rejection.as_str(),
            Self::ServerFault => "server_fault",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_are_not_failures() {
        for status in [200, 201, 204, 299] {
            assert_eq!(FailureKind::from_status(status), None, "status {status}");
        }
    }

    #[test]
    fn client_statuses_are_split_by_rejection() {
        assert_eq!(
            FailureKind::from_status(401),
            Some(FailureKind::ClientRejection(
                Rejection::AuthenticationRequired
            ))
        );
        assert_eq!(
            FailureKind::from_status(403),
            Some(FailureKind::ClientRejection(Rejection::Forbidden))
        );
        assert_eq!(
            FailureKind::from_status(404),
            Some(FailureKind::ClientRejection(Rejection::NotFound))
        );
        assert_eq!(
            FailureKind::from_status(422),
            Some(FailureKind::ClientRejection(Rejection::ValidationFailed))
        );
        assert_eq!(
            FailureKind::from_status(409),
            Some(FailureKind::ClientRejection(Rejection::Other))
        );
    }

    #[test]
    fn redirects_and_informational_are_generic_rejections() {
        assert_eq!(
            FailureKind::from_status(304),
            Some(FailureKind::ClientRejection(Rejection::Other))
        );
        assert_eq!(
            FailureKind::from_status(100),
            Some(FailureKind::ClientRejection(Rejection::Other))
        );
    }

    #[test]
    fn server_statuses_are_faults() {
        for status in [500, 502, 503, 504, 599] {
            assert_eq!(
                FailureKind::from_status(status),
                Some(FailureKind::ServerFault),
                "status {status}"
            );
        }
    }

    #[test]
    fn only_401_requires_reauthentication() {
        assert!(FailureKind::from_status(401).is_some_and(FailureKind::requires_reauthentication));
        assert!(!FailureKind::from_status(403).is_some_and(FailureKind::requires_reauthentication));
        assert!(!FailureKind::ConnectionFailure.requires_reauthentication());
    }

    #[test]
    fn kind_serializes_with_tag() {
        let json = serde_json::to_value(FailureKind::ClientRejection(Rejection::NotFound)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "client_rejection", "rejection": "not_found"})
        );
        let json = serde_json::to_value(FailureKind::ServerFault).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "server_fault"}));
    }
}
