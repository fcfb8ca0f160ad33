//! Decoding of error payloads sent by the backend.

use crate::problem::ValidationViolation;
use serde_json::Value;

/// Maximum error message size taken from a plain-text body (8KB).
///
/// Non-JSON error bodies are surfaced verbatim as the failure message; this
/// bounds how much of such a body ends up in logs and problem details.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// JSON fields probed, in order, for a human-readable message.
const MESSAGE_FIELDS: [&str; 4] = ["message", "detail", "error", "title"];

/// What could be recovered from a non-2xx response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerErrorBody {
    pub message: Option<String>,
    pub violations: Vec<ValidationViolation>,
}

impl ServerErrorBody {
    /// Extract the message and violations from a decoded JSON body.
    #[must_use]
    pub fn from_json(body: &Value) -> Self {
        let message = MESSAGE_FIELDS
            .iter()
            .filter_map(|field| body.get(field).and_then(Value::as_str))
            .map(str::trim)
            .find(|m| !m.is_empty())
            .map(|m| truncate(m, ERROR_BODY_PREVIEW_LIMIT).to_owned());

        let violations = body
            .get("errors")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(violation_from_json).collect())
            .unwrap_or_default();

        Self {
            message,
            violations,
        }
    }

    /// Use a plain-text body as the message.
    #[must_use]
    pub fn from_text(body: &str) -> Self {
        let trimmed = body.trim();
        Self {
            message: (!trimmed.is_empty())
                .then(|| truncate(trimmed, ERROR_BODY_PREVIEW_LIMIT).to_owned()),
            violations: Vec::new(),
        }
    }
}

fn violation_from_json(item: &Value) -> Option<ValidationViolation> {
    let message = item.get("message").and_then(Value::as_str)?;
    Some(ValidationViolation {
        field: item
            .get("field")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        message: message.to_owned(),
        code: item.get("code").and_then(Value::as_str).map(str::to_owned),
    })
}

/// Truncate to at most `limit` bytes on a char boundary.
fn truncate(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
