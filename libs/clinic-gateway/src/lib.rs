#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Request gateway to the Clinic Desk backend
//!
//! Every backend call goes through [`RequestGateway`], a hyper-based client with:
//! - JSON content negotiation and a `User-Agent` on every request
//! - The signed-in user's identity header and bearer credential, read from an
//!   explicitly passed [`SessionContext`]
//! - A per-attempt timeout (10 s by default)
//! - Up to 3 retries with linear backoff, for transport failures and timeouts only
//! - Classification of every non-2xx status into a [`FailureKind`], never retried
//! - Transparent response decompression and a response body size limit
//!
//! # Example
//!
//! ```ignore
//! use clinic_gateway::{RequestGateway, SessionContext, SessionToken, UserIdentity, Role};
//!
//! let user = UserIdentity::new("u-17", "Dr. Ana Ruiz", Role::Physician)?;
//! let session = SessionContext::signed_in(SessionToken::new("eyJ...", user)?);
//! let gateway = RequestGateway::builder("https://api.clinic.local/v1").build(session)?;
//!
//! match gateway.get("/patients/17").await {
//!     Ok(response) => println!("{:?}", response.payload()),
//!     Err(err) if err.requires_reauthentication() => {
//!         gateway.session().sign_out();
//!     }
//!     Err(err) => eprintln!("{}: {err}", err.kind()),
//! }
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod session;
mod tls;

pub use builder::GatewayBuilder;
pub use client::{RequestGateway, RequestOutcome};
pub use config::{
    DEFAULT_IDENTITY_HEADER, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT, GatewayConfig,
    LinearBackoff, MAX_RETRIES, RETRY_DELAY, RetryConfig, RetryTrigger, TlsRootConfig,
    TransportSecurity,
};
pub use error::GatewayError;
pub use layers::{
    DefaultHeadersLayer, DefaultHeadersService, IdentityLayer, IdentityService,
    RETRY_ATTEMPT_HEADER, RetryLayer, RetryService,
};
pub use request::{BaseUrl, RequestDescriptor};
pub use response::{GatewayResponse, Payload, is_json_content_type};
pub use session::{Role, SessionContext, SessionError, SessionToken, UserIdentity};

pub use clinic_errors::{FailureKind, Problem, Rejection};
