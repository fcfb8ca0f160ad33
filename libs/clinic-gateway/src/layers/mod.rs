//! Tower layers for the gateway middleware stack
//!
//! - [`DefaultHeadersLayer`] - JSON content negotiation and User-Agent headers
//! - [`IdentityLayer`] - identity and bearer headers from the current session
//! - [`RetryLayer`] - bounded retry with linear backoff for transient failures

mod default_headers;
mod identity;
mod retry;

pub use default_headers::{DefaultHeadersLayer, DefaultHeadersService};
pub use identity::{IdentityLayer, IdentityService};
pub use retry::{RETRY_ATTEMPT_HEADER, RetryLayer, RetryService};
