//! Error catalog: one static definition per failure kind

use crate::kind::{FailureKind, Rejection};
use crate::problem::Problem;

/// Static error definition from catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub title: &'static str,
    pub code: &'static str,
    /// Message shown to the user when the backend provided none
    pub message: &'static str,
    pub type_url: &'static str,
}

pub const CONNECTION_FAILURE: ErrDef = ErrDef {
    title: "Connection Failure",
    code: "CONNECTION_FAILURE",
    message: "The server could not be reached. Check your connection and try again.",
    type_url: "https://errors.clinic-desk.dev/CONNECTION_FAILURE",
};

pub const AUTHENTICATION_REQUIRED: ErrDef = ErrDef {
    title: "Authentication Required",
    code: "AUTHENTICATION_REQUIRED",
    message: "Your session has expired. Please sign in again.",
    type_url: "https://errors.clinic-desk.dev/AUTHENTICATION_REQUIRED",
};

pub const FORBIDDEN: ErrDef = ErrDef {
    title: "Forbidden",
    code: "FORBIDDEN",
    message: "You do not have permission to perform this action.",
    type_url: "https://errors.clinic-desk.dev/FORBIDDEN",
};

pub const NOT_FOUND: ErrDef = ErrDef {
    title: "Not Found",
    code: "NOT_FOUND",
    message: "The requested record does not exist.",
    type_url: "https://errors.clinic-desk.dev/NOT_FOUND",
};

pub const VALIDATION_FAILED: ErrDef = ErrDef {
    title: "Validation Failed",
    code: "VALIDATION_FAILED",
    message: "Some of the submitted data is invalid.",
    type_url: "https://errors.clinic-desk.dev/VALIDATION_FAILED",
};

pub const CLIENT_ERROR: ErrDef = ErrDef {
    title: "Request Rejected",
    code: "CLIENT_ERROR",
    message: "The request was rejected by the server.",
    type_url: "https://errors.clinic-desk.dev/CLIENT_ERROR",
};

pub const SERVER_FAULT: ErrDef = ErrDef {
    title: "Server Fault",
    code: "SERVER_FAULT",
    message: "The server failed to process the request. Try again later.",
    type_url: "https://errors.clinic-desk.dev/SERVER_FAULT",
};

pub const INVALID_INPUT: ErrDef = ErrDef {
    title: "Invalid Input",
    code: "INVALID_INPUT",
    message: "The supplied values are not valid.",
    type_url: "https://errors.clinic-desk.dev/INVALID_INPUT",
};

impl ErrDef {
    /// Catalog entry for a failure kind.
    #[must_use]
    pub fn for_kind(kind: FailureKind) -> &'static ErrDef {
        match kind {
            FailureKind::ConnectionFailure => &CONNECTION_FAILURE,
            FailureKind::ClientRejection(Rejection::AuthenticationRequired) => {
                &AUTHENTICATION_REQUIRED
            }
            FailureKind::ClientRejection(Rejection::Forbidden) => &FORBIDDEN,
            FailureKind::ClientRejection(Rejection::NotFound) => &NOT_FOUND,
            FailureKind::ClientRejection(Rejection::ValidationFailed) => &VALIDATION_FAILED,
            FailureKind::ClientRejection(Rejection::Other) => &CLIENT_ERROR,
            FailureKind::ServerFault => &SERVER_FAULT,
            FailureKind::InvalidInput => &INVALID_INPUT,
        }
    }

    /// Convert this definition into a Problem.
    ///
    /// An empty `detail` falls back to the catalog message.
    #[inline]
    pub fn as_problem(&self, kind: FailureKind, status: u16, detail: impl Into<String>) -> Problem {
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            self.message.to_owned()
        } else {
            detail
        };
        Problem::new(kind, status, self.title, detail)
            .with_code(self.code)
            .with_type(self.type_url)
    }
}
