//! Failure taxonomy shared by the Clinic Desk components
//!
//! This crate provides pure data types, with no HTTP client or runtime
//! dependencies:
//! - [`FailureKind`] / [`Rejection`] - the classification every outcome maps to
//! - [`ErrDef`] - static catalog entry (code, title, user-facing message) per kind
//! - [`Problem`] - RFC 9457 shaped value the presentation layer renders
//! - [`ServerErrorBody`] - best-effort decoding of backend error payloads
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod body;
pub mod catalog;
pub mod kind;
pub mod problem;

pub use body::{ERROR_BODY_PREVIEW_LIMIT, ServerErrorBody};
pub use catalog::ErrDef;
pub use kind::{FailureKind, Rejection};
pub use problem::{APPLICATION_PROBLEM_JSON, Problem, ValidationViolation};
