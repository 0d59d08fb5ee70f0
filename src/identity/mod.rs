//! Client-side identity and session handling shared by every page.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod role;
mod provider;
mod redirect;
mod guard;
pub mod pages;
pub mod session;

pub use principal::{Identity, IdentityParseError, VerifiedIdentity, CachedIdentity};
pub use role::{Role, UnknownRole, role_icon};
pub use provider::{IdentityVerifier, HttpVerifier, VerifyError};
pub use redirect::{Navigator, RedirectGate, LogNavigator, RecordingNavigator, DEFAULT_REDIRECT_WINDOW};
pub use guard::{SessionGuard, Outcome, GuardFailure};
pub use pages::Page;
pub use session::{SessionStore, MemoryStore, FileStore, AuthState, RepairReport};
