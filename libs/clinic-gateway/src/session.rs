//! Signed-in user state shared between the presentation layer and the gateway.
//!
//! The presentation layer signs users in and out; the gateway only reads the
//! current token to decorate outgoing requests.

use http::HeaderValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Dashboard a user is allowed to work in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrative,
    Physician,
    Nurse,
    HumanResources,
    Support,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrative => "administrative",
            Self::Physician => "physician",
            Self::Nurse => "nurse",
            Self::HumanResources => "human_resources",
            Self::Support => "support",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("user id contains characters not allowed in a header value")]
    InvalidUserId,
    #[error("credential contains characters not allowed in a header value")]
    InvalidCredential,
}

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    id: String,
    display_name: String,
    role: Role,
}

impl UserIdentity {
    /// # Errors
    /// Returns `SessionError` if `id` is empty or cannot be sent as a header value.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SessionError::EmptyUserId);
        }
        if HeaderValue::from_str(&id).is_err() {
            return Err(SessionError::InvalidUserId);
        }
        Ok(Self {
            id,
            display_name: display_name.into(),
            role,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

/// Opaque credential issued by the backend at sign-in.
///
/// `Debug` and `Display` print `[REDACTED]`; the buffer is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Credential(String);

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Credential plus identity of the signed-in user.
#[derive(Clone, Debug)]
pub struct SessionToken {
    credential: Credential,
    user: UserIdentity,
}

impl SessionToken {
    /// # Errors
    /// Returns `SessionError::InvalidCredential` if the credential cannot be
    /// sent in an `Authorization` header.
    pub fn new(credential: impl Into<String>, user: UserIdentity) -> Result<Self, SessionError> {
        let credential = Credential(credential.into());
        let probe = zeroize::Zeroizing::new(format!("Bearer {}", credential.0));
        if HeaderValue::from_str(&probe).is_err() {
            return Err(SessionError::InvalidCredential);
        }
        Ok(Self { credential, user })
    }

    #[must_use]
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Read-only access to the credential.
    ///
    /// Callers must not log, store, or otherwise persist the returned slice.
    #[must_use]
    pub fn expose_credential(&self) -> &str {
        &self.credential.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user.id, self.user.role)
    }
}

/// Cloneable handle to the current session.
///
/// Clones share the same slot: signing out through one handle is seen by every
/// gateway holding another.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<SessionToken>>>,
}

impl SessionContext {
    /// Context with nobody signed in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(token: SessionToken) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token))),
        }
    }

    /// Replace the current token, returning the previous one.
    #[allow(clippy::must_use_candidate)]
    pub fn sign_in(&self, token: SessionToken) -> Option<SessionToken> {
        tracing::debug!(user = %token.user.id, role = %token.user.role, "session started");
        self.inner.write().replace(token)
    }

    /// Clear the current token, returning it.
    #[allow(clippy::must_use_candidate)]
    pub fn sign_out(&self) -> Option<SessionToken> {
        let previous = self.inner.write().take();
        if let Some(token) = &previous {
            tracing::debug!(user = %token.user.id, "session cleared");
        }
        previous
    }

    /// Snapshot of the current token.
    #[must_use]
    pub fn current(&self) -> Option<SessionToken> {
        self.inner.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.read().is_some()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn nurse() -> UserIdentity {
        UserIdentity::new("u-17", "Ana Ruiz", Role::Nurse).unwrap()
    }

    #[test]
    fn identity_validation() {
        assert_eq!(
            UserIdentity::new(" ", "x", Role::Support),
            Err(SessionError::EmptyUserId)
        );
        assert_eq!(
            UserIdentity::new("bad\nid", "x", Role::Support),
            Err(SessionError::InvalidUserId)
        );
        assert_eq!(nurse().role(), Role::Nurse);
    }

    #[test]
    fn credential_validation() {
        assert!(matches!(
            SessionToken::new("tok\r\nX-Injected: 1", nurse()),
            Err(SessionError::InvalidCredential)
        ));
        assert!(SessionToken::new("tok-123", nurse()).is_ok());
    }

    #[test]
    fn credential_is_redacted() {
        let token = SessionToken::new("super-secret-value", nurse()).unwrap();
        let dbg = format!("{token:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(dbg.contains("[REDACTED]"));
        assert_eq!(token.to_string(), "u-17 (nurse)");
        assert_eq!(token.expose_credential(), "super-secret-value");
    }

    #[test]
    fn clones_share_the_session() {
        let ctx = SessionContext::anonymous();
        let other = ctx.clone();
        assert!(!other.is_authenticated());

        ctx.sign_in(SessionToken::new("tok", nurse()).unwrap());
        assert!(other.is_authenticated());
        assert_eq!(other.current().unwrap().user().id(), "u-17");

        let previous = other.sign_out();
        assert!(previous.is_some());
        assert!(!ctx.is_authenticated());
        assert!(ctx.sign_out().is_none());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(Role::HumanResources).unwrap(),
            serde_json::json!("human_resources")
        );
        let role: Role = serde_json::from_str("\"physician\"").unwrap();
        assert_eq!(role, Role::Physician);
    }
}
