use std::time::Duration;

/// Default User-Agent string for backend requests
pub const DEFAULT_USER_AGENT: &str = concat!("clinic-gateway/", env!("CARGO_PKG_VERSION"));

/// Header carrying the signed-in user's id
pub const DEFAULT_IDENTITY_HEADER: &str = "X-User-Id";

/// Per-attempt timeout applied when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Additional attempts after the first one for transient failures
pub const MAX_RETRIES: usize = 3;

/// Backoff step; the wait before retry `n` is `RETRY_DELAY * n`
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Why a failed attempt may or may not be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RetryTrigger {
    /// Transport-level errors (connection refused, DNS failure, reset, etc.)
    TransportError,
    /// The attempt exceeded the per-attempt timeout
    Timeout,
    /// Everything else: HTTP responses, local errors, a closed service
    NonRetryable,
}

impl RetryTrigger {
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::TransportError | Self::Timeout)
    }
}

/// Linear backoff: the wait grows by `step` with every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub step: Duration,
}

impl LinearBackoff {
    #[must_use]
    pub const fn new(step: Duration) -> Self {
        Self { step }
    }

    /// Wait before retry number `retry` (1-indexed): `step * retry`.
    #[must_use]
    pub fn delay_for(&self, retry: usize) -> Duration {
        let factor = u32::try_from(retry).unwrap_or(u32::MAX);
        self.step.saturating_mul(factor)
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(RETRY_DELAY)
    }
}

/// Retry policy for transient failures.
///
/// HTTP responses are never retried whatever their status: a received
/// response is a decision by the backend, not a transport fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts after the first one (0 disables retries)
    pub max_retries: usize,
    pub backoff: LinearBackoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: LinearBackoff::default(),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            backoff: LinearBackoff::default(),
        }
    }

    /// Default attempt count with a millisecond-scale step, for tests against local mocks
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: LinearBackoff::new(Duration::from_millis(10)),
        }
    }

    #[must_use]
    pub fn should_retry(&self, trigger: RetryTrigger) -> bool {
        self.max_retries > 0 && trigger.is_transient()
    }

    /// Upper bound on how long a call can take before its outcome is known.
    ///
    /// `timeout * (max_retries + 1) + step * (1 + 2 + ... + max_retries)`
    #[must_use]
    pub fn worst_case_latency(&self, per_attempt: Duration) -> Duration {
        let attempts = u32::try_from(self.max_retries.saturating_add(1)).unwrap_or(u32::MAX);
        let waits: Duration = (1..=self.max_retries)
            .map(|retry| self.backoff.delay_for(retry))
            .fold(Duration::ZERO, Duration::saturating_add);
        per_attempt.saturating_mul(attempts).saturating_add(waits)
    }
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only)
    #[default]
    TlsOnly,
    /// Allow plain HTTP, for backends on a trusted local network and mock servers
    AllowInsecureHttp,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Origin every descriptor path is resolved against, e.g. `https://api.clinic.local/v1`
    pub base_url: String,

    /// Per-attempt timeout (default: 10 seconds)
    pub request_timeout: Duration,

    pub retry: RetryConfig,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    pub user_agent: String,

    /// Header carrying the user id of the current session
    pub identity_header: String,

    pub transport: TransportSecurity,

    pub tls_roots: TlsRootConfig,

    /// Requests that may queue in front of the service (minimum 1)
    pub buffer_capacity: usize,

    /// Idle connection timeout; `None` keeps idle connections indefinitely
    pub pool_idle_timeout: Option<Duration>,

    pub pool_max_idle_per_host: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryConfig::default(),
            max_body_size: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            identity_header: DEFAULT_IDENTITY_HEADER.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 8,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Configuration for tests against a local mock server
    ///
    /// Plain HTTP, a short timeout and millisecond backoff.
    #[must_use]
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(2),
            retry: RetryConfig::fast(),
            transport: TransportSecurity::AllowInsecureHttp,
            ..Self::default()
        }
    }

    /// See [`RetryConfig::worst_case_latency`].
    #[must_use]
    pub fn worst_case_latency(&self) -> Duration {
        self.retry.worst_case_latency(self.request_timeout)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff.step, Duration::from_secs(1));
        assert_eq!(config.identity_header, "X-User-Id");
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert!(config.user_agent.starts_with("clinic-gateway/"));
    }

    #[test]
    fn test_backoff_is_linear() {
        let backoff = LinearBackoff::new(Duration::from_millis(500));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_backoff_saturates() {
        let backoff = LinearBackoff::new(Duration::MAX);
        assert_eq!(backoff.delay_for(2), Duration::MAX);
    }

    #[test]
    fn test_only_transient_triggers_retry() {
        let config = RetryConfig::default();
        assert!(config.should_retry(RetryTrigger::TransportError));
        assert!(config.should_retry(RetryTrigger::Timeout));
        assert!(!config.should_retry(RetryTrigger::NonRetryable));
        assert!(!RetryConfig::disabled().should_retry(RetryTrigger::Timeout));
    }

    #[test]
    fn test_worst_case_latency() {
        // 10s * 4 attempts + 1s + 2s + 3s
        assert_eq!(
            GatewayConfig::default().worst_case_latency(),
            Duration::from_secs(46)
        );
        let config = GatewayConfig {
            retry: RetryConfig::disabled(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.worst_case_latency(), Duration::from_secs(10));
    }

    #[test]
    fn test_for_testing_allows_http() {
        let config = GatewayConfig::for_testing("http://127.0.0.1:9");
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(config.retry.max_retries, MAX_RETRIES);
    }
}
