//! Coalesced navigation to the login page.
//!
//! Several guarded widgets on one page can fail at once, and a rapidly reloaded page
//! can fail repeatedly. The gate lets the first redirect through and swallows every
//! other request made while that one is still within the coalescing window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

pub const DEFAULT_REDIRECT_WINDOW: Duration = Duration::from_millis(100);

/// Performs the actual navigation (browser location change, process exit, ...).
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Single-flight redirect: one navigation per window.
pub struct RedirectGate {
    navigator: Arc<dyn Navigator>,
    window: Duration,
    fired_at: Mutex<Option<Instant>>,
}

impl RedirectGate {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self::with_window(navigator, DEFAULT_REDIRECT_WINDOW)
    }

    pub fn with_window(navigator: Arc<dyn Navigator>, window: Duration) -> Self {
        Self { navigator, window, fired_at: Mutex::new(None) }
    }

    pub fn window(&self) -> Duration { self.window }

    /// Navigate to `target` unless a redirect already went out within the window.
    /// Returns whether this call navigated.
    pub fn request(&self, target: &str) -> bool {
        let now = Instant::now();
        {
            let mut fired = self.fired_at.lock();
            if let Some(at) = *fired {
                if now.duration_since(at) < self.window {
                    debug!(target: "quiver::redirect", "redirect to {} coalesced", target);
                    return false;
                }
            }
            *fired = Some(now);
        }
        self.navigator.navigate(target);
        true
    }

    /// Whether a redirect is currently in flight.
    pub fn pending(&self) -> bool {
        let fired = *self.fired_at.lock();
        fired.map(|at| at.elapsed() < self.window).unwrap_or(false)
    }
}

/// Navigator for the CLI: logs the destination and remembers it.
#[derive(Debug, Default)]
pub struct LogNavigator {
    last: Mutex<Option<String>>,
}

impl LogNavigator {
    pub fn new() -> Self { Self::default() }

    pub fn last_target(&self) -> Option<String> { self.last.lock().clone() }
}

impl Navigator for LogNavigator {
    fn navigate(&self, target: &str) {
        info!(target: "quiver::redirect", "redirecting to {}", target);
        *self.last.lock() = Some(target.to_string());
    }
}

/// Navigator that records every navigation, for tests and embedding hosts that
/// drain navigations themselves.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self { Self::default() }

    pub fn count(&self) -> usize { self.targets.lock().len() }

    pub fn targets(&self) -> Vec<String> { self.targets.lock().clone() }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.targets.lock().push(target.to_string());
    }
}
