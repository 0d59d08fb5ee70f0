//! Session guard behavior against a scripted identity verifier and in-memory storage.
//! Covers storage repair, role gating, rejection/outage handling and redirect coalescing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use quiver::error::{AppError, AppResult};
use quiver::identity::session::{TOKEN_KEY, USER_INFO_KEY};
use quiver::identity::{
    FileStore, GuardFailure, Identity, IdentityVerifier, MemoryStore, Outcome, RecordingNavigator, RedirectGate, Role,
    SessionGuard, SessionStore, VerifiedIdentity, VerifyError,
};

struct ScriptedVerifier {
    result: Result<VerifiedIdentity, VerifyError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    fn new(result: Result<VerifiedIdentity, VerifyError>) -> Self {
        Self { result, delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    fn slow(result: Result<VerifiedIdentity, VerifyError>, delay: Duration) -> Self {
        Self { result, delay, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl IdentityVerifier for ScriptedVerifier {
    async fn verify_identity(&self, _token: &str) -> Result<VerifiedIdentity, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    verifier: Arc<ScriptedVerifier>,
    nav: Arc<RecordingNavigator>,
    guard: SessionGuard,
}

fn harness_with(entries: &[(&str, &str)], verifier: ScriptedVerifier) -> Harness {
    let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
    let verifier = Arc::new(verifier);
    let nav = Arc::new(RecordingNavigator::new());
    let gate = Arc::new(RedirectGate::with_window(nav.clone(), Duration::from_secs(5)));
    let guard = SessionGuard::new(store.clone(), verifier.clone(), gate, "login.html");
    Harness { store, verifier, nav, guard }
}

fn harness(entries: &[(&str, &str)], result: Result<VerifiedIdentity, VerifyError>) -> Harness {
    harness_with(entries, ScriptedVerifier::new(result))
}

fn identity(v: serde_json::Value) -> Identity {
    Identity::from_record(v).unwrap()
}

const STALE: &str = r#"{"email":"old@club.org","role":"ADMIN"}"#;

fn logged_in() -> Vec<(&'static str, &'static str)> {
    vec![(TOKEN_KEY, "tok"), (USER_INFO_KEY, STALE)]
}

#[tokio::test]
async fn empty_storage_is_unauthenticated_without_network() {
    let h = harness(&[], Err(VerifyError::ServerError("unused".into())));
    let out = h.guard.guard(Some(Role::Admin)).await;
    assert_eq!(out.reason(), Some(&GuardFailure::NoCredential));
    assert!(matches!(out, Outcome::Unauthenticated { .. }));
    assert_eq!(out.redirect(), Some("login.html"));
    assert_eq!(h.verifier.calls(), 0);
    assert_eq!(h.nav.targets(), vec!["login.html".to_string()]);
}

#[tokio::test]
async fn cached_identity_without_token_is_dropped_without_network() {
    let h = harness(&[(USER_INFO_KEY, STALE)], Ok(identity(json!({"role": "ADMIN"}))));
    let out = h.guard.guard(None).await;
    assert!(matches!(out, Outcome::Unauthenticated { reason: GuardFailure::NoCredential, .. }));
    assert_eq!(h.store.get(USER_INFO_KEY).unwrap(), None);
    assert_eq!(h.verifier.calls(), 0);
}

#[tokio::test]
async fn token_without_cached_identity_is_dropped_without_network() {
    let h = harness(&[(TOKEN_KEY, "tok")], Ok(identity(json!({"role": "ADMIN"}))));
    let out = h.guard.guard(Some(Role::Admin)).await;
    assert!(matches!(out, Outcome::Unauthenticated { reason: GuardFailure::NoCredential, .. }));
    assert!(h.store.snapshot().is_empty());
    assert_eq!(h.verifier.calls(), 0);
    assert_eq!(h.nav.count(), 1);
}

#[tokio::test]
async fn matching_role_authenticates_and_refreshes_cache() {
    let verified = identity(json!({"id": 1, "email": "admin@club.org", "role": "ADMIN"}));
    let h = harness(&logged_in(), Ok(verified.clone()));
    let out = h.guard.guard(Some(Role::Admin)).await;
    assert_eq!(out, Outcome::Authenticated(verified.clone()));
    assert_eq!(out.redirect(), None);
    assert_eq!(h.store.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));
    let cached = Identity::from_storage_str(&h.store.get(USER_INFO_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(cached, verified);
    assert_eq!(h.verifier.calls(), 1);
    assert_eq!(h.nav.count(), 0);
}

#[tokio::test]
async fn role_mismatch_drops_only_the_token() {
    let h = harness(&logged_in(), Ok(identity(json!({"email": "coach@club.org", "role": "COACH"}))));
    let out = h.guard.guard(Some(Role::Admin)).await;
    assert_eq!(
        out.reason(),
        Some(&GuardFailure::RoleMismatch { required: Role::Admin, actual: Some(Role::Coach) })
    );
    assert!(matches!(out, Outcome::Unauthenticated { .. }));
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(h.store.get(USER_INFO_KEY).unwrap().as_deref(), Some(STALE));
    assert_eq!(h.nav.count(), 1);
}

#[tokio::test]
async fn unknown_role_fails_guarded_pages_but_passes_landing() {
    let judge = identity(json!({"role": "JUDGE"}));
    let h = harness(&logged_in(), Ok(judge.clone()));
    let out = h.guard.guard(Some(Role::Archer)).await;
    assert_eq!(out.reason(), Some(&GuardFailure::RoleMismatch { required: Role::Archer, actual: None }));

    let h = harness(&logged_in(), Ok(judge.clone()));
    assert_eq!(h.guard.guard(None).await, Outcome::Authenticated(judge));
}

#[tokio::test]
async fn rejected_token_clears_both_keys() {
    for err in [VerifyError::Unauthorized, VerifyError::Forbidden] {
        let mut entries = logged_in();
        entries.push(("theme", "dark"));
        let h = harness(&entries, Err(err.clone()));
        let out = h.guard.guard(Some(Role::Coach)).await;
        assert!(matches!(out, Outcome::Unauthenticated { .. }), "{:?}", err);
        assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(h.store.get(USER_INFO_KEY).unwrap(), None);
        assert_eq!(h.store.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(h.nav.count(), 1);
    }
}

#[tokio::test]
async fn outages_preserve_storage() {
    for err in [VerifyError::ServerError("HTTP 502".into()), VerifyError::NetworkError("refused".into())] {
        let h = harness(&logged_in(), Err(err.clone()));
        let before = h.store.snapshot();
        let out = h.guard.guard(Some(Role::Admin)).await;
        assert!(matches!(out, Outcome::Error { .. }), "{:?}", err);
        assert_eq!(out.redirect(), Some("login.html"));
        assert_eq!(h.store.snapshot(), before);
        assert_eq!(h.nav.count(), 1);
    }
}

#[tokio::test]
async fn concurrent_failures_redirect_once() {
    let h = harness_with(
        &logged_in(),
        ScriptedVerifier::slow(Err(VerifyError::NetworkError("down".into())), Duration::from_millis(20)),
    );
    let widget = h.guard.for_login_target("../login.html");
    let (a, b) = tokio::join!(h.guard.guard(Some(Role::Admin)), widget.guard(Some(Role::Admin)));
    assert!(matches!(a, Outcome::Error { .. }));
    assert!(matches!(b, Outcome::Error { .. }));
    assert_eq!(h.verifier.calls(), 2);
    assert_eq!(h.nav.count(), 1);
}

#[tokio::test]
async fn concurrent_repairs_converge() {
    let h = harness(&[(TOKEN_KEY, "tok")], Err(VerifyError::Unauthorized));
    let other = h.guard.clone();
    let (a, b) = tokio::join!(h.guard.guard(None), other.guard(None));
    assert!(!a.is_authenticated() && !b.is_authenticated());
    assert!(h.store.snapshot().is_empty());
    assert_eq!(h.verifier.calls(), 0);
    assert_eq!(h.nav.count(), 1);
}

#[tokio::test]
async fn logout_clears_and_redirects_once() {
    let h = harness(&logged_in(), Err(VerifyError::Unauthorized));
    assert!(h.guard.logout().unwrap());
    assert!(h.store.snapshot().is_empty());
    assert!(!h.guard.logout().unwrap());
    assert_eq!(h.nav.count(), 1);
}

struct BrokenStore;

impl SessionStore for BrokenStore {
    fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::io("io_error", "disk gone"))
    }
    fn set(&self, _key: &str, _value: &str) -> AppResult<()> {
        Err(AppError::io("io_error", "disk gone"))
    }
    fn remove(&self, _key: &str) -> AppResult<()> {
        Err(AppError::io("io_error", "disk gone"))
    }
}

#[tokio::test]
async fn unreadable_storage_is_an_error_outcome() {
    let verifier = Arc::new(ScriptedVerifier::new(Ok(identity(json!({"role": "ADMIN"})))));
    let nav = Arc::new(RecordingNavigator::new());
    let guard = SessionGuard::new(
        Arc::new(BrokenStore),
        verifier.clone(),
        Arc::new(RedirectGate::new(nav.clone())),
        "login.html",
    );
    let out = guard.guard(Some(Role::Admin)).await;
    assert!(matches!(out, Outcome::Error { reason: GuardFailure::Storage(_), .. }));
    assert_eq!(verifier.calls(), 0);
    assert_eq!(nav.count(), 1);
}

#[tokio::test]
async fn logout_reports_storage_failure_but_still_redirects() {
    let nav = Arc::new(RecordingNavigator::new());
    let guard = SessionGuard::new(
        Arc::new(BrokenStore),
        Arc::new(ScriptedVerifier::new(Err(VerifyError::Unauthorized))),
        Arc::new(RedirectGate::new(nav.clone())),
        "login.html",
    );
    assert_eq!(guard.logout().unwrap_err().code_str(), "io_error");
    assert_eq!(nav.targets(), vec!["login.html".to_string()]);
}

#[tokio::test]
async fn logout_recovers_a_corrupt_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, r#"{"auth_token": "tok", "user_info": "#).unwrap();

    let verifier = Arc::new(ScriptedVerifier::new(Ok(identity(json!({"role": "ADMIN"})))));
    let nav = Arc::new(RecordingNavigator::new());
    let gate = Arc::new(RedirectGate::with_window(nav.clone(), Duration::ZERO));
    let guard = SessionGuard::new(Arc::new(FileStore::new(&path)), verifier.clone(), gate, "login.html");

    let out = guard.guard(Some(Role::Admin)).await;
    assert!(matches!(out, Outcome::Error { reason: GuardFailure::Storage(_), .. }));

    assert!(guard.logout().unwrap());
    let reopened = FileStore::new(&path);
    assert_eq!(reopened.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(reopened.get(USER_INFO_KEY).unwrap(), None);

    let out = guard.guard(Some(Role::Admin)).await;
    assert_eq!(out.reason(), Some(&GuardFailure::NoCredential));
    assert_eq!(verifier.calls(), 0);
}
