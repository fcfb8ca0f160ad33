use crate::client::{BufferedService, RequestGateway};
use crate::config::{GatewayConfig, RetryConfig, TlsRootConfig, TransportSecurity};
use crate::error::GatewayError;
use crate::layers::{DefaultHeadersLayer, IdentityLayer, RetryLayer};
use crate::request::BaseUrl;
use crate::response::collect_body;
use crate::session::SessionContext;
use crate::tls::build_https_connector;
use bytes::Bytes;
use http::HeaderName;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tokio::time::Instant;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Type-erased service for a single attempt, with the body already collected.
type AttemptService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<Bytes>, GatewayError>;

/// Builder for constructing a [`RequestGateway`] with a layered tower middleware stack.
#[derive(Debug, Clone)]
pub struct GatewayBuilder {
    config: GatewayConfig,
}

impl GatewayBuilder {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: GatewayConfig::new(base_url),
        }
    }

    #[must_use]
    pub fn with_config(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Set the per-attempt timeout
    ///
    /// Every retry attempt gets its own timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn identity_header(mut self, name: impl Into<String>) -> Self {
        self.config.identity_header = name.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Equivalent to `.transport(TransportSecurity::AllowInsecureHttp)`.
    #[must_use]
    pub fn allow_insecure_http(self) -> Self {
        self.transport(TransportSecurity::AllowInsecureHttp)
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Set the buffer capacity for concurrent request handling
    ///
    /// A capacity of 0 is clamped to 1; `tower::buffer::Buffer` panics with 0.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the gateway with all configured layers
    ///
    /// Must be called from within a Tokio runtime: the request buffer spawns
    /// its worker task here.
    ///
    /// # Errors
    /// Returns an error if the base URL, user agent or identity header is
    /// invalid, or if TLS initialization fails.
    pub fn build(self, session: SessionContext) -> Result<RequestGateway, GatewayError> {
        let config = self.config;

        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                base_url = %config.base_url,
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 traffic to the backend will not be encrypted"
            );
        }

        let base_url = BaseUrl::parse(&config.base_url, config.transport)?;
        let identity_header = HeaderName::try_from(config.identity_header.as_str())?;
        let headers_layer = DefaultHeadersLayer::try_new(&config.user_agent)?;
        let https = build_https_connector(config.tls_roots, config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .http2_only(false);
        if let Some(idle_timeout) = config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        // =======================================================================
        // Tower Layer Stack (outer to inner)
        // =======================================================================
        //
        //   Buffer → Retry → Identity → attempt deadline
        //     → [Timeout → DefaultHeaders → Decompression → hyper_client]
        //     → collect body (size-limited, same deadline)
        //
        // Identity sits inside the retry loop so every attempt re-reads the
        // session. The deadline is fixed when the attempt starts; the timeout
        // layer bounds the wait for the status line and the body read gets
        // whatever is left.
        //
        // Every HTTP status comes back as Ok(Response); only transport, timeout
        // and local failures are errors. Once a non-2xx status line has
        // arrived, body failures no longer turn into errors, so the status is
        // never retried. Classification happens in the client.
        //
        // =======================================================================
        let timeout = config.request_timeout;
        let max_body_size = config.max_body_size;

        let exchange = ServiceBuilder::new()
            .layer(headers_layer)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_err(GatewayError::from);

        let attempt = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .service(exchange)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout))
            .map_future(move |exchange| {
                let deadline = Instant::now() + timeout;
                async move {
                    match exchange.await {
                        Ok(response) => {
                            collect_body(response, max_body_size, deadline, timeout).await
                        }
                        Err(err) => Err(err),
                    }
                }
            });

        let attempt: AttemptService = attempt.boxed_clone();
        let authenticated: AttemptService =
            IdentityLayer::new(session.clone(), identity_header)
                .layer(attempt)
                .boxed_clone();
        let retrying: AttemptService = RetryLayer::new(config.retry.clone())
            .layer(authenticated)
            .boxed_clone();

        // Buffer spawns a background task that processes requests from a channel,
        // providing Clone + Send + Sync without any mutex serialization.
        let service: BufferedService = Buffer::new(retrying, config.buffer_capacity.max(1));

        tracing::debug!(
            base_url = %base_url.as_str(),
            timeout_ms = timeout.as_millis(),
            max_retries = config.retry.max_retries,
            "request gateway ready"
        );

        Ok(RequestGateway::new(service, base_url, session, config))
    }
}

/// Map tower errors to `GatewayError` with actual timeout duration
///
/// Attempts to extract an existing `GatewayError` from the boxed error before
/// wrapping as `Transport`.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> GatewayError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return GatewayError::Timeout(timeout);
    }

    match err.downcast::<GatewayError>() {
        Ok(gateway_err) => *gateway_err,
        Err(other) => GatewayError::Transport(other),
    }
}
