use crate::error::GatewayError;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderName, HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

const APPLICATION_JSON: &str = "application/json";

/// Tower layer that adds the JSON content negotiation headers and User-Agent
/// to every request.
///
/// Headers already present on the request are left untouched.
#[derive(Clone)]
pub struct DefaultHeadersLayer {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl DefaultHeadersLayer {
    /// # Errors
    /// Returns `GatewayError::InvalidHeaderValue` if the user agent string is not valid
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, GatewayError> {
        let user_agent = HeaderValue::from_str(user_agent.as_ref())?;
        Ok(Self {
            headers: vec![
                (CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON)),
                (ACCEPT, HeaderValue::from_static(APPLICATION_JSON)),
                (USER_AGENT, user_agent),
            ],
        })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service that fills in missing default headers
#[derive(Clone)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in &self.headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Test service that records the headers it receives.
    #[derive(Clone, Default)]
    struct CaptureService {
        seen: Arc<Mutex<Option<http::HeaderMap>>>,
    }

    impl Service<Request<Full<Bytes>>> for CaptureService {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            *self.seen.lock().unwrap() = Some(req.headers().clone());
            std::future::ready(Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap()))
        }
    }

    fn request() -> http::request::Builder {
        Request::builder()
            .method(Method::GET)
            .uri("http://backend.local/patients")
    }

    #[tokio::test]
    async fn test_defaults_added() {
        let capture = CaptureService::default();
        let layer = DefaultHeadersLayer::try_new("test-agent/1.0").unwrap();
        let mut service = layer.layer(capture.clone());

        let req = request().body(Full::new(Bytes::new())).unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();

        let headers = capture.seen.lock().unwrap().take().unwrap();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[USER_AGENT], "test-agent/1.0");
    }

    #[tokio::test]
    async fn test_existing_headers_not_overwritten() {
        let capture = CaptureService::default();
        let layer = DefaultHeadersLayer::try_new("test-agent/1.0").unwrap();
        let mut service = layer.layer(capture.clone());

        let req = request()
            .header(ACCEPT, "text/csv")
            .header(USER_AGENT, "custom-agent/2.0")
            .body(Full::new(Bytes::new()))
            .unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();

        let headers = capture.seen.lock().unwrap().take().unwrap();
        assert_eq!(headers[ACCEPT], "text/csv");
        assert_eq!(headers[USER_AGENT], "custom-agent/2.0");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers.get_all(ACCEPT).iter().count(), 1);
    }

    #[test]
    fn test_invalid_user_agent() {
        assert!(DefaultHeadersLayer::try_new("invalid\x00agent").is_err());
    }
}
