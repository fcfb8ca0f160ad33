use crate::error::GatewayError;
use bytes::Bytes;
use clinic_errors::{FailureKind, ServerErrorBody};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON-typed response, parsed
    Json(Value),
    /// Any other content type, as text
    Text(String),
    /// No body at all
    Empty,
}

impl Payload {
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Successful outcome of a dispatched request.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    status: StatusCode,
    headers: HeaderMap,
    payload: Payload,
}

impl GatewayResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Deserialize a JSON payload into `T`.
    ///
    /// # Errors
    /// Returns `GatewayError::Decode` if the payload is not JSON or does not
    /// match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        let status = self.status.as_u16();
        let value = match &self.payload {
            Payload::Json(value) => value.clone(),
            Payload::Text(text) => {
                return serde_json::from_str(text)
                    .map_err(|source| GatewayError::Decode { status, source });
            }
            Payload::Empty => Value::Null,
        };
        serde_json::from_value(value).map_err(|source| GatewayError::Decode { status, source })
    }
}

/// Whether a `Content-Type` denotes JSON (`application/json` or any `+json` type).
#[must_use]
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Read the whole body, bounded by `limit` bytes and by the attempt's `deadline`.
///
/// For 2xx responses a stalled body counts as a timed out attempt, a broken
/// one as a transport error and an oversized one as `BodyTooLarge`. For any
/// other status the response is final: a body that cannot be read in full
/// is dropped and the status alone classifies the outcome.
pub(crate) async fn collect_body<B>(
    response: Response<B>,
    limit: usize,
    deadline: Instant,
    timeout: Duration,
) -> Result<Response<Bytes>, GatewayError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let status = parts.status.as_u16();
    let collected = tokio::time::timeout_at(deadline, Limited::new(body, limit).collect()).await;

    if parts.status.is_success() {
        return match collected {
            Ok(Ok(collected)) => Ok(Response::from_parts(parts, collected.to_bytes())),
            Ok(Err(err)) if err.is::<LengthLimitError>() => {
                Err(GatewayError::BodyTooLarge { status, limit })
            }
            Ok(Err(err)) => Err(GatewayError::Transport(err)),
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };
    }

    let body = match collected {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(err)) => {
            tracing::debug!(status, error = %err, "error response body dropped");
            Bytes::new()
        }
        Err(_) => {
            tracing::debug!(status, "error response body timed out; dropped");
            Bytes::new()
        }
    };
    Ok(Response::from_parts(parts, body))
}

/// Turn a collected response into the caller's outcome.
///
/// 2xx responses decode into a [`Payload`]; everything else becomes a
/// classified [`GatewayError`] carrying the backend's message when it sent one.
pub(crate) fn into_outcome(response: Response<Bytes>) -> Result<GatewayResponse, GatewayError> {
    let (parts, body) = response.into_parts();
    let status = parts.status;
    let is_json = is_json_content_type(&parts.headers);

    let Some(kind) = FailureKind::from_status(status.as_u16()) else {
        let payload = decode_payload(status, &body, is_json)?;
        return Ok(GatewayResponse {
            status,
            headers: parts.headers,
            payload,
        });
    };

    let server = if is_json {
        serde_json::from_slice::<Value>(&body).map_or_else(
            |_| ServerErrorBody::from_text(&String::from_utf8_lossy(&body)),
            |value| ServerErrorBody::from_json(&value),
        )
    } else {
        ServerErrorBody::from_text(&String::from_utf8_lossy(&body))
    };

    let status = status.as_u16();
    Err(match kind {
        FailureKind::ClientRejection(rejection) => GatewayError::Rejected {
            rejection,
            status,
            message: server.message,
            violations: server.violations,
        },
        _ => GatewayError::ServerFault {
            status,
            message: server.message,
        },
    })
}

fn decode_payload(status: StatusCode, body: &Bytes, is_json: bool) -> Result<Payload, GatewayError> {
    if body.is_empty() {
        return Ok(Payload::Empty);
    }
    if is_json {
        return serde_json::from_slice(body)
            .map(Payload::Json)
            .map_err(|source| GatewayError::Decode {
                status: status.as_u16(),
                source,
            });
    }
    Ok(Payload::Text(String::from_utf8_lossy(body).into_owned()))
}
