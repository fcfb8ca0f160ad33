//! Layered configuration for the console.
//!
//! Sources, later wins: built-in defaults, YAML file (`--config`),
//! environment (`CLINIC__SECTION__KEY`), command-line overrides.

use anyhow::{Context, Result, bail};
use clinic_copay::{ANNUAL_LIMIT, CopayError, CopayPolicy, FIXED_COPAY};
use clinic_gateway::{
    DEFAULT_IDENTITY_HEADER, DEFAULT_REQUEST_TIMEOUT, GatewayConfig, LinearBackoff, MAX_RETRIES,
    RETRY_DELAY, RetryConfig, Role, SessionContext, SessionToken, TlsRootConfig,
    TransportSecurity, UserIdentity,
};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "CLINIC__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub backend: BackendConfig,
    pub copay: CopayConfig,
    pub logging: LoggingConfig,
    /// Signs in at startup when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,
    pub max_retries: usize,
    /// Linear backoff step: retry `n` waits `n * retry_delay`
    #[serde(with = "duration_str")]
    pub retry_delay: Duration,
    pub allow_insecure_http: bool,
    pub native_roots: bool,
    pub identity_header: String,
    pub max_body_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443/api/v1".to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            allow_insecure_http: false,
            native_roots: false,
            identity_header: DEFAULT_IDENTITY_HEADER.to_owned(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopayConfig {
    pub fixed_copay: Decimal,
    pub annual_limit: Decimal,
}

impl Default for CopayConfig {
    fn default() -> Self {
        Self {
            fixed_copay: FIXED_COPAY,
            annual_limit: ANNUAL_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    #[serde(serialize_with = "redacted")]
    pub credential: String,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

impl DeskConfig {
    /// Load defaults, then `path` (if given), then `CLINIC__*` variables.
    ///
    /// # Errors
    /// Fails if `path` does not exist or any source does not fit the schema.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_cli_overrides(&mut self, verbose: u8, base_url: Option<&str>) {
        match verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
        if let Some(url) = base_url {
            url.clone_into(&mut self.backend.base_url);
        }
    }

    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        let backend = &self.backend;
        GatewayConfig {
            request_timeout: backend.request_timeout,
            retry: RetryConfig {
                max_retries: backend.max_retries,
                backoff: LinearBackoff::new(backend.retry_delay),
            },
            max_body_size: backend.max_body_size,
            identity_header: backend.identity_header.clone(),
            transport: if backend.allow_insecure_http {
                TransportSecurity::AllowInsecureHttp
            } else {
                TransportSecurity::TlsOnly
            },
            tls_roots: if backend.native_roots {
                TlsRootConfig::Native
            } else {
                TlsRootConfig::WebPki
            },
            ..GatewayConfig::new(backend.base_url.clone())
        }
    }

    /// # Errors
    /// Returns `CopayError::InvalidPolicy` for non-positive amounts or a copay
    /// above the limit.
    pub fn copay_policy(&self) -> Result<CopayPolicy, CopayError> {
        CopayPolicy::new(self.copay.fixed_copay, self.copay.annual_limit)
    }

    /// Session described by the `session` section, anonymous when absent.
    ///
    /// # Errors
    /// Fails if the configured user or credential cannot be sent in headers.
    pub fn session_context(&self) -> Result<SessionContext> {
        let Some(session) = &self.session else {
            return Ok(SessionContext::anonymous());
        };
        let user = UserIdentity::new(
            session.user_id.clone(),
            session.display_name.clone(),
            session.role,
        )
        .context("invalid session user")?;
        let token = SessionToken::new(session.credential.clone(), user)
            .context("invalid session credential")?;
        Ok(SessionContext::signed_in(token))
    }

    /// Pretty JSON with the credential redacted.
    ///
    /// # Errors
    /// Fails only if serialization fails.
    pub fn to_redacted_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}

fn redacted<S: Serializer>(_: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("[REDACTED]")
}

/// `Duration` as a human-readable string (`"10s"`, `"250ms"`).
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
