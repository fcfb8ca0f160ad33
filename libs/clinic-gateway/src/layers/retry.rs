use crate::config::{RetryConfig, RetryTrigger};
use crate::error::GatewayError;
use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Header name for retry attempt number (1-indexed).
/// Added to retried requests to indicate which retry attempt this is.
pub const RETRY_ATTEMPT_HEADER: &str = "X-Retry-Attempt";

/// Tower layer that retries transient failures with linear backoff
#[derive(Clone)]
pub struct RetryLayer {
    config: RetryConfig,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service that runs the bounded retry loop.
///
/// Any `Ok(Response)` ends the loop whatever its status. Timeouts and
/// transport errors are retried up to `max_retries` times, waiting
/// `step * n` before retry `n`; once they run out the caller gets a single
/// [`GatewayError::ConnectionFailure`] carrying the attempt count and the
/// last error. Other errors are returned as they are.
#[derive(Clone)]
pub struct RetryService<S> {
    inner: S,
    config: RetryConfig,
}

impl<S, ResBody> Service<Request<Full<Bytes>>> for RetryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResBody>, Error = GatewayError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = GatewayError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Swap so we consume the instance that was poll_ready'd,
        // leaving a fresh clone for the next poll_ready cycle.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        let (parts, body) = req.into_parts();
        let http_version = parts.version;
        let extensions = parts.extensions.clone();
        let parts = Arc::new(parts);

        Box::pin(async move {
            let method = parts.method.clone();
            let path = parts.uri.path().to_owned();

            let mut attempt = 0usize;
            loop {
                let mut req = Request::from_parts((*parts).clone(), body.clone());
                *req.version_mut() = http_version;
                *req.extensions_mut() = extensions.clone();

                if attempt > 0
                    && let Ok(value) = HeaderValue::try_from(attempt.to_string())
                {
                    req.headers_mut().insert(RETRY_ATTEMPT_HEADER, value);
                }

                let mut svc = inner.clone();
                svc.ready().await?;

                let err = match svc.call(req).await {
                    Ok(resp) => return Ok(resp),
                    Err(err) => err,
                };

                let trigger = get_retry_trigger(&err);
                if !trigger.is_transient() {
                    return Err(err);
                }

                if !config.should_retry(trigger) || attempt >= config.max_retries {
                    let attempts = attempt + 1;
                    tracing::warn!(
                        attempts,
                        error = %err,
                        method = %method,
                        path = %path,
                        "backend unreachable, giving up"
                    );
                    return Err(GatewayError::ConnectionFailure {
                        attempts,
                        last: Box::new(err),
                    });
                }

                let backoff = config.backoff.delay_for(attempt + 1);
                tracing::debug!(
                    retry = attempt + 1,
                    max_retries = config.max_retries,
                    error = %err,
                    trigger = ?trigger,
                    method = %method,
                    path = %path,
                    backoff_ms = backoff.as_millis(),
                    "Retrying request after error"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        })
    }
}

/// Extract retry trigger from an error
fn get_retry_trigger(err: &GatewayError) -> RetryTrigger {
    match err {
        GatewayError::Transport(_) => RetryTrigger::TransportError,
        GatewayError::Timeout(_) => RetryTrigger::Timeout,
        _ => RetryTrigger::NonRetryable,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::LinearBackoff;
    use http::{Method, StatusCode};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Mock service that fails with the given errors first, then answers `status`.
    #[derive(Clone)]
    struct ScriptedService {
        failures: Arc<Mutex<Vec<fn() -> GatewayError>>>,
        status: StatusCode,
        calls: Arc<Mutex<usize>>,
        retry_headers: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl ScriptedService {
        fn new(failures: Vec<fn() -> GatewayError>, status: StatusCode) -> Self {
            Self {
                failures: Arc::new(Mutex::new(failures)),
                status,
                calls: Arc::new(Mutex::new(0)),
                retry_headers: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Service<Request<Full<Bytes>>> for ScriptedService {
        type Response = Response<Bytes>;
        type Error = GatewayError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            *self.calls.lock().unwrap() += 1;
            self.retry_headers.lock().unwrap().push(
                req.headers()
                    .get(RETRY_ATTEMPT_HEADER)
                    .map(|v| v.to_str().unwrap().to_owned()),
            );
            let failure = {
                let mut failures = self.failures.lock().unwrap();
                (!failures.is_empty()).then(|| failures.remove(0))
            };
            let status = self.status;
            Box::pin(async move {
                match failure {
                    Some(make_err) => Err(make_err()),
                    None => Ok(Response::builder()
                        .status(status)
                        .body(Bytes::new())
                        .unwrap()),
                }
            })
        }
    }

    fn timeout() -> GatewayError {
        GatewayError::Timeout(Duration::from_millis(5))
    }

    fn transport() -> GatewayError {
        GatewayError::Transport("connection reset".into())
    }

    fn too_large() -> GatewayError {
        GatewayError::BodyTooLarge {
            status: 200,
            limit: 1,
        }
    }

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            backoff: LinearBackoff::new(Duration::from_millis(1)),
        }
    }

    fn request() -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::GET)
            .uri("http://backend.local/patients")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let mock = ScriptedService::new(vec![transport, timeout], StatusCode::OK);
        let mut service = RetryLayer::new(fast_config(3)).layer(mock.clone());

        let resp = service.ready().await.unwrap().call(request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_yields_single_connection_failure() {
        let mock = ScriptedService::new(vec![timeout; 10], StatusCode::OK);
        let mut service = RetryLayer::new(fast_config(3)).layer(mock.clone());

        let err = service
            .ready()
            .await
            .unwrap()
            .call(request())
            .await
            .unwrap_err();
        match err {
            GatewayError::ConnectionFailure { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, GatewayError::Timeout(_)));
            }
            other => panic!("expected ConnectionFailure, got {other:?}"),
        }
        assert_eq!(mock.calls(), 4, "exactly MAX_RETRIES + 1 attempts");
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        for status in [
            StatusCode::NOT_FOUND,
            StatusCode::UNAUTHORIZED,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let mock = ScriptedService::new(vec![], status);
            let mut service = RetryLayer::new(fast_config(3)).layer(mock.clone());

            let resp = service.ready().await.unwrap().call(request()).await.unwrap();
            assert_eq!(resp.status(), status);
            assert_eq!(mock.calls(), 1, "status {status} must not be retried");
        }
    }

    #[tokio::test]
    async fn test_non_transient_error_is_returned_as_is() {
        let mock = ScriptedService::new(vec![too_large], StatusCode::OK);
        let mut service = RetryLayer::new(fast_config(3)).layer(mock.clone());

        let err = service
            .ready()
            .await
            .unwrap()
            .call(request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BodyTooLarge { .. }));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_retry_still_classifies() {
        let mock = ScriptedService::new(vec![transport], StatusCode::OK);
        let mut service = RetryLayer::new(RetryConfig::disabled()).layer(mock.clone());

        let err = service
            .ready()
            .await
            .unwrap()
            .call(request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ConnectionFailure { attempts: 1, .. }
        ));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_attempt_header() {
        let mock = ScriptedService::new(vec![timeout, timeout], StatusCode::OK);
        let mut service = RetryLayer::new(fast_config(3)).layer(mock.clone());

        service.ready().await.unwrap().call(request()).await.unwrap();
        let headers = mock.retry_headers.lock().unwrap().clone();
        assert_eq!(
            headers,
            vec![None, Some("1".to_owned()), Some("2".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_backoff_is_linear() {
        let step = Duration::from_millis(20);
        let mock = ScriptedService::new(vec![transport; 3], StatusCode::OK);
        let config = RetryConfig {
            max_retries: 3,
            backoff: LinearBackoff::new(step),
        };
        let mut service = RetryLayer::new(config).layer(mock.clone());

        let started = Instant::now();
        service.ready().await.unwrap().call(request()).await.unwrap();
        // 20ms + 40ms + 60ms
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert_eq!(mock.calls(), 4);
    }

    #[test]
    fn test_retry_trigger_mapping() {
        assert_eq!(get_retry_trigger(&timeout()), RetryTrigger::Timeout);
        assert_eq!(
            get_retry_trigger(&transport()),
            RetryTrigger::TransportError
        );
        assert_eq!(get_retry_trigger(&too_large()), RetryTrigger::NonRetryable);
        assert_eq!(
            get_retry_trigger(&GatewayError::ServiceClosed),
            RetryTrigger::NonRetryable
        );
    }
}
