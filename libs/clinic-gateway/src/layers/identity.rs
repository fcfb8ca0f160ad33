use crate::session::{SessionContext, SessionToken};
use http::header::{AUTHORIZATION, HeaderName};
use http::{HeaderMap, HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that decorates requests with the current session.
///
/// When someone is signed in, sets the identity header to the user's id and
/// `Authorization: Bearer <credential>`. Without a session the request goes
/// out undecorated and the backend decides.
///
/// Sits inside the retry loop, so every attempt reads the session afresh.
#[derive(Clone, Debug)]
pub struct IdentityLayer {
    session: SessionContext,
    identity_header: HeaderName,
}

impl IdentityLayer {
    #[must_use]
    pub fn new(session: SessionContext, identity_header: HeaderName) -> Self {
        Self {
            session,
            identity_header,
        }
    }
}

impl<S> Layer<S> for IdentityLayer {
    type Service = IdentityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdentityService {
            inner,
            session: self.session.clone(),
            identity_header: self.identity_header.clone(),
        }
    }
}

/// Service that injects identity headers before forwarding the request.
///
/// Created by [`IdentityLayer`].
#[derive(Clone, Debug)]
pub struct IdentityService<S> {
    inner: S,
    session: SessionContext,
    identity_header: HeaderName,
}

impl<S, B, ResBody> Service<Request<B>> for IdentityService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if let Some(token) = self.session.current() {
            decorate(req.headers_mut(), &self.identity_header, &token);
        }
        self.inner.call(req)
    }
}

fn decorate(headers: &mut HeaderMap, identity_header: &HeaderName, token: &SessionToken) {
    if !headers.contains_key(identity_header) {
        match HeaderValue::from_str(token.user().id()) {
            Ok(value) => {
                headers.insert(identity_header.clone(), value);
            }
            Err(e) => tracing::warn!(error = %e, "user id not usable as header value"),
        }
    }

    if !headers.contains_key(AUTHORIZATION) {
        let raw = zeroize::Zeroizing::new(format!("Bearer {}", token.expose_credential()));
        match HeaderValue::from_str(&raw) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => tracing::warn!(error = %e, "credential not usable as header value"),
        }
    }
}
