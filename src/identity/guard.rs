//! Page-load session guard.
//!
//! Every guarded page calls `SessionGuard::guard` once with the role it requires.
//! The guard repairs the local credential/identity pairing, checks the token
//! against the remote identity endpoint, enforces the role, and decides whether the
//! page may be shown. Every failure ends in a coalesced login redirect; none escapes
//! as an error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::AppResult;

use super::principal::VerifiedIdentity;
use super::provider::{IdentityVerifier, VerifyError};
use super::redirect::RedirectGate;
use super::role::Role;
use super::session::{self, SessionStore, TOKEN_KEY, USER_INFO_KEY};

/// Why a guard invocation did not authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardFailure {
    /// No usable token after repair; the network was not consulted.
    NoCredential,
    /// Verified identity does not hold the required role.
    RoleMismatch { required: Role, actual: Option<Role> },
    Unauthorized,
    Forbidden,
    ServerError(String),
    NetworkError(String),
    /// Local storage could not be read or written.
    Storage(String),
}

impl From<VerifyError> for GuardFailure {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Unauthorized => GuardFailure::Unauthorized,
            VerifyError::Forbidden => GuardFailure::Forbidden,
            VerifyError::ServerError(m) => GuardFailure::ServerError(m),
            VerifyError::NetworkError(m) => GuardFailure::NetworkError(m),
        }
    }
}

/// Result of one guard invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Authenticated(VerifiedIdentity),
    Unauthenticated { redirect: String, reason: GuardFailure },
    Error { redirect: String, reason: GuardFailure },
}

impl Outcome {
    pub fn is_authenticated(&self) -> bool { matches!(self, Outcome::Authenticated(_)) }

    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        match self {
            Outcome::Authenticated(id) => Some(id),
            _ => None,
        }
    }

    pub fn redirect(&self) -> Option<&str> {
        match self {
            Outcome::Authenticated(_) => None,
            Outcome::Unauthenticated { redirect, .. } | Outcome::Error { redirect, .. } => Some(redirect),
        }
    }

    pub fn reason(&self) -> Option<&GuardFailure> {
        match self {
            Outcome::Authenticated(_) => None,
            Outcome::Unauthenticated { reason, .. } | Outcome::Error { reason, .. } => Some(reason),
        }
    }
}

/// Shared session guard. Cheap to clone; clones share the store, the verifier and the
/// redirect gate, so concurrent failures still produce a single navigation.
#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn IdentityVerifier>,
    redirect: Arc<RedirectGate>,
    login_target: String,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn IdentityVerifier>,
        redirect: Arc<RedirectGate>,
        login_target: impl Into<String>,
    ) -> Self {
        Self { store, verifier, redirect, login_target: login_target.into() }
    }

    pub fn login_target(&self) -> &str { &self.login_target }

    /// Same store, verifier and gate, different login page.
    pub fn for_login_target(&self, login_target: impl Into<String>) -> Self {
        Self { login_target: login_target.into(), ..self.clone() }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> { &self.store }

    pub async fn guard(&self, required: Option<Role>) -> Outcome {
        let outcome = self.evaluate(required).await;
        match &outcome {
            Outcome::Authenticated(id) => {
                info!(
                    target: "quiver::guard",
                    "authenticated role={} required={}",
                    id.role().map(|r| r.as_str()).unwrap_or("unknown"),
                    required.map(|r| r.as_str()).unwrap_or("none")
                );
            }
            Outcome::Unauthenticated { redirect, reason } | Outcome::Error { redirect, reason } => {
                info!(target: "quiver::guard", "not authenticated: {:?}; redirecting to {}", reason, redirect);
                self.redirect.request(redirect);
            }
        }
        outcome
    }

    async fn evaluate(&self, required: Option<Role>) -> Outcome {
        let (state, report) = match session::repair(self.store.as_ref()) {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "quiver::guard", "session storage unavailable during repair: {}", e);
                return self.error(GuardFailure::Storage(e.to_string()));
            }
        };
        debug!(
            target: "quiver::guard",
            "auth check token={} user_info={} repaired={}",
            state.token.is_some(), state.user_info.is_some(), report.changed()
        );
        let Some(token) = state.token else {
            return self.unauthenticated(GuardFailure::NoCredential);
        };

        match self.verifier.verify_identity(&token).await {
            Ok(identity) => {
                if let Some(req) = required {
                    if !identity.satisfies(Some(req)) {
                        warn!(
                            target: "quiver::guard",
                            "role mismatch: required={} actual={}",
                            req, identity.role().map(|r| r.as_str()).unwrap_or("unknown")
                        );
                        if let Err(e) = self.store.remove(TOKEN_KEY) {
                            warn!(target: "quiver::guard", "failed to drop token after role mismatch: {}", e);
                        }
                        return self.unauthenticated(GuardFailure::RoleMismatch { required: req, actual: identity.role() });
                    }
                }
                if let Err(e) = self.store.set(USER_INFO_KEY, &identity.to_storage_string()) {
                    warn!(target: "quiver::guard", "failed to refresh cached identity: {}", e);
                    return self.error(GuardFailure::Storage(e.to_string()));
                }
                Outcome::Authenticated(identity)
            }
            Err(e) if e.is_rejection() => {
                warn!(target: "quiver::guard", "authentication rejected: {}", e);
                if let Err(se) = session::clear(self.store.as_ref()) {
                    warn!(target: "quiver::guard", "failed to clear rejected session: {}", se);
                }
                self.unauthenticated(e.into())
            }
            Err(e) => {
                // Credentials are kept so the next load can retry.
                warn!(target: "quiver::guard", "identity check unavailable: {}", e);
                self.error(e.into())
            }
        }
    }

    /// Drop the session and send the user to the login page. The redirect is requested
    /// even when clearing fails; the clear error is still returned. `Ok(false)` means a
    /// redirect was already under way.
    pub fn logout(&self) -> AppResult<bool> {
        info!(target: "quiver::guard", "logging out");
        let cleared = session::clear(self.store.as_ref());
        if let Err(e) = &cleared {
            warn!(target: "quiver::guard", "failed to clear session on logout: {}", e);
        }
        let navigated = self.redirect.request(&self.login_target);
        cleared.map(|_| navigated)
    }

    fn unauthenticated(&self, reason: GuardFailure) -> Outcome {
        Outcome::Unauthenticated { redirect: self.login_target.clone(), reason }
    }

    fn error(&self, reason: GuardFailure) -> Outcome {
        Outcome::Error { redirect: self.login_target.clone(), reason }
    }
}
