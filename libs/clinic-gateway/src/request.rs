use crate::config::TransportSecurity;
use crate::error::GatewayError;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;

/// One outbound call to the backend.
///
/// The path is resolved against the gateway's base URL at dispatch time.
/// Header and body errors are captured while building and surfaced by
/// [`RequestGateway::dispatch`](crate::RequestGateway::dispatch), so a
/// descriptor can be built fluently.
///
/// # Example
///
/// ```ignore
/// let descriptor = RequestDescriptor::post("/appointments")
///     .header("x-request-id", "abc123")
///     .json(&NewAppointment { patient_id: 17, slot })?;
/// let outcome = gateway.dispatch(descriptor).await;
/// ```
#[derive(Debug)]
#[must_use = "RequestDescriptor does nothing until it is dispatched"]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    body: Option<Value>,
    headers: Vec<(HeaderName, HeaderValue)>,
    /// Error captured during building (deferred to dispatch)
    error: Option<GatewayError>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            error: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a header override.
    ///
    /// Overrides win over the gateway's default and identity headers.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(GatewayError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(GatewayError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Set an already-built JSON body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(GatewayError::Json(e));
                }
            }
        }
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Build the HTTP request against `base`.
    pub(crate) fn into_request(self, base: &BaseUrl) -> Result<Request<Full<Bytes>>, GatewayError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let uri = base.join(&self.path)?;
        let body = match &self.body {
            Some(value) => Bytes::from(serde_json::to_vec(value)?),
            None => Bytes::new(),
        };

        let mut builder = Request::builder().method(self.method).uri(uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        Ok(builder.body(Full::new(body))?)
    }
}

/// Validated origin (plus optional path prefix) requests are sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    /// Normalized without a trailing slash
    url: String,
}

impl BaseUrl {
    /// Validate `url` for the given transport security mode.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidBaseUrl` for unparsable URLs, URLs without
    /// a host, or with a query, and `GatewayError::InvalidScheme` when the
    /// scheme is not allowed.
    pub fn parse(url: &str, transport: TransportSecurity) -> Result<Self, GatewayError> {
        let invalid = |reason: &str| GatewayError::InvalidBaseUrl {
            url: url.to_owned(),
            reason: reason.to_owned(),
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

        if uri.authority().is_none() {
            return Err(invalid("missing host/authority"));
        }
        if uri.query().is_some() {
            return Err(invalid("query strings are not allowed in the base URL"));
        }

        match uri.scheme_str() {
            Some("https") => {}
            Some("http") => {
                if transport == TransportSecurity::TlsOnly {
                    return Err(GatewayError::InvalidScheme {
                        scheme: "http".to_owned(),
                        reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                    });
                }
            }
            Some(scheme) => {
                return Err(GatewayError::InvalidScheme {
                    scheme: scheme.to_owned(),
                    reason: "only http:// and https:// schemes are supported".to_owned(),
                });
            }
            None => return Err(invalid("missing scheme")),
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Resolve a relative path.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidPath` for absolute URLs, scheme-relative
    /// paths and anything that does not parse as a URI.
    pub fn join(&self, path: &str) -> Result<Uri, GatewayError> {
        let invalid = |reason: &str| GatewayError::InvalidPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };

        if path.contains("://") || path.starts_with("//") {
            return Err(invalid("path must be relative to the base URL"));
        }

        let relative = path.trim_start_matches('/');
        let full = if relative.is_empty() {
            format!("{}/", self.url)
        } else {
            format!("{}/{relative}", self.url)
        };
        full.parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> BaseUrl {
        BaseUrl::parse("https://api.clinic.local/v1/", TransportSecurity::TlsOnly).unwrap()
    }

    #[test]
    fn test_base_url_normalized() {
        assert_eq!(base().as_str(), "https://api.clinic.local/v1");
    }

    #[test]
    fn test_base_url_rejects_http_when_tls_only() {
        let err = BaseUrl::parse("http://api.clinic.local", TransportSecurity::TlsOnly).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidScheme { .. }));
        assert!(BaseUrl::parse("http://api.clinic.local", TransportSecurity::AllowInsecureHttp).is_ok());
    }

    #[test]
    fn test_base_url_rejects_bad_input() {
        for url in ["", "not a url", "/relative/only", "https://api.clinic.local/?q=1"] {
            let err = BaseUrl::parse(url, TransportSecurity::TlsOnly).unwrap_err();
            assert!(
                matches!(err, GatewayError::InvalidBaseUrl { .. }),
                "{url}: {err:?}"
            );
        }
        let err = BaseUrl::parse("ftp://api.clinic.local", TransportSecurity::TlsOnly).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidScheme { .. }));
    }

    #[test]
    fn test_join_paths() {
        let base = base();
        assert_eq!(
            base.join("/patients/17").unwrap(),
            "https://api.clinic.local/v1/patients/17"
        );
        assert_eq!(
            base.join("patients?page=2").unwrap(),
            "https://api.clinic.local/v1/patients?page=2"
        );
        assert_eq!(base.join("").unwrap(), "https://api.clinic.local/v1/");
    }

    #[test]
    fn test_join_rejects_escaping_paths() {
        for path in ["https://evil.example/x", "//evil.example/x", "/bad path"] {
            assert!(
                matches!(base().join(path), Err(GatewayError::InvalidPath { .. })),
                "{path}"
            );
        }
    }

    #[test]
    fn test_descriptor_builds_request() {
        let req = RequestDescriptor::post("/appointments")
            .header("x-request-id", "abc")
            .json(&json!({"patientId": 17}))
            .into_request(&base())
            .unwrap();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), "https://api.clinic.local/v1/appointments");
        assert_eq!(req.headers()["x-request-id"], "abc");
    }

    #[test]
    fn test_header_error_is_deferred() {
        let descriptor = RequestDescriptor::get("/patients").header("bad header", "x");
        let err = descriptor.into_request(&base()).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidHeaderName(_)));

        let err = RequestDescriptor::get("/patients")
            .header("x-note", "line\nbreak")
            .into_request(&base())
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidHeaderValue(_)));
    }

    #[test]
    fn test_descriptor_accessors() {
        let descriptor = RequestDescriptor::put("/inventory/4").body(json!({"qty": 3}));
        assert_eq!(descriptor.method(), Method::PUT);
        assert_eq!(descriptor.path(), "/inventory/4");
        assert_eq!(descriptor.json_body(), Some(&json!({"qty": 3})));
    }
}
