use crate::builder::GatewayBuilder;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::request::{BaseUrl, RequestDescriptor};
use crate::response::{GatewayResponse, into_outcome};
use crate::session::SessionContext;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use tower::buffer::Buffer;
use tower::{Service, ServiceExt};

/// Type alias for the future type of the inner service
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response<Bytes>, GatewayError>> + Send>>;

/// Type alias for the buffered service
/// Buffer<Req, F> in tower 0.5 where Req is the request type and F is the service future type
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Result of a dispatched request: a decoded payload or exactly one failure.
pub type RequestOutcome = Result<GatewayResponse, GatewayError>;

/// Single entry point for every backend call
///
/// Wraps a tower stack that adds JSON and identity headers, bounds each
/// attempt with a timeout, retries transport failures and timeouts with
/// linear backoff, and classifies every non-2xx status without retrying it.
///
/// # Thread Safety
///
/// `RequestGateway` is `Clone + Send + Sync`. Cloning is cheap (internal
/// channel clone); all clones share the same [`SessionContext`].
///
/// # Example
///
/// ```ignore
/// let session = SessionContext::signed_in(token);
/// let gateway = RequestGateway::builder("https://api.clinic.local/v1").build(session)?;
///
/// let patients = gateway.get("/patients").await?;
/// if let Some(rows) = patients.payload().as_json() {
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct RequestGateway {
    service: BufferedService,
    base_url: BaseUrl,
    session: SessionContext,
    config: GatewayConfig,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.session.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl RequestGateway {
    pub(crate) fn new(
        service: BufferedService,
        base_url: BaseUrl,
        session: SessionContext,
        config: GatewayConfig,
    ) -> Self {
        Self {
            service,
            base_url,
            session,
            config,
        }
    }

    /// Create a builder for a gateway pointed at `base_url`
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> GatewayBuilder {
        GatewayBuilder::new(base_url)
    }

    /// Send a request and classify the result.
    ///
    /// Never panics and never returns more than one failure: after retries are
    /// exhausted a single [`GatewayError::ConnectionFailure`] is returned.
    pub async fn dispatch(&self, descriptor: RequestDescriptor) -> RequestOutcome {
        let method = descriptor.method().clone();
        let path = descriptor.path().to_owned();

        let outcome = self.send(descriptor).await;
        match &outcome {
            Ok(response) => tracing::debug!(
                %method,
                path = %path,
                status = response.status().as_u16(),
                "request completed"
            ),
            Err(err) => tracing::debug!(
                %method,
                path = %path,
                kind = err.kind().as_str(),
                status = err.status(),
                error = %err,
                "request failed"
            ),
        }
        outcome
    }

    async fn send(&self, descriptor: RequestDescriptor) -> RequestOutcome {
        let request = descriptor.into_request(&self.base_url)?;
        tracing::trace!(uri = %request.uri(), "dispatching request");

        let mut service = self.service.clone();
        let response = service
            .ready()
            .await
            .map_err(map_buffer_error)?
            .call(request)
            .await
            .map_err(map_buffer_error)?;

        into_outcome(response)
    }

    /// GET `path`
    pub async fn get(&self, path: &str) -> RequestOutcome {
        self.dispatch(RequestDescriptor::get(path)).await
    }

    /// POST `body` as JSON to `path`
    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestOutcome {
        self.dispatch(RequestDescriptor::post(path).json(body)).await
    }

    /// PUT `body` as JSON to `path`
    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestOutcome {
        self.dispatch(RequestDescriptor::put(path).json(body)).await
    }

    /// PATCH `body` as JSON to `path`
    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestOutcome {
        self.dispatch(RequestDescriptor::patch(path).json(body)).await
    }

    /// DELETE `path`
    pub async fn delete(&self, path: &str) -> RequestOutcome {
        self.dispatch(RequestDescriptor::delete(path)).await
    }

    /// Session shared by every clone of this gateway
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Map buffer errors back to `GatewayError`
///
/// The inner service's errors come back boxed; anything else means the buffer
/// worker is gone.
#[must_use]
pub fn map_buffer_error(err: tower::BoxError) -> GatewayError {
    match err.downcast::<GatewayError>() {
        Ok(gateway_err) => *gateway_err,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; gateway unavailable"
            );
            GatewayError::ServiceClosed
        }
    }
}
