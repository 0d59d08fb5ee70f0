//! Runtime configuration, read from the environment with CLI overrides applied on top.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, AppResult};
use crate::identity::{Page, DEFAULT_REDIRECT_WINDOW};

pub const DEFAULT_API_BASE: &str = "http://localhost:3000";
pub const DEFAULT_STATE_FILE: &str = ".quiver/storage.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the club API (`/auth/profile`, `/profiles`, ...).
    pub api_base: String,
    /// File backing the persistent session store.
    pub state_file: PathBuf,
    pub redirect_window: Duration,
    /// Login page override; when unset each page uses its own relative login path.
    pub login_page: Option<String>,
    /// Base for template fetches; a URL or a directory. Defaults to the API base.
    pub template_base: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            redirect_window: DEFAULT_REDIRECT_WINDOW,
            login_page: None,
            template_base: None,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any variable lookup; `from_env` passes the process environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> AppResult<Self> {
        let mut cfg = Config::default();
        if let Some(v) = get("QUIVER_API_BASE").filter(|v| !v.trim().is_empty()) {
            cfg.api_base = v.trim().to_string();
        }
        if let Some(v) = get("QUIVER_STATE_FILE").filter(|v| !v.trim().is_empty()) {
            cfg.state_file = PathBuf::from(v.trim());
        }
        if let Some(v) = get("QUIVER_REDIRECT_WINDOW_MS") {
            let ms: u64 = v.trim().parse().map_err(|_| {
                AppError::user("invalid_config".to_string(), format!("QUIVER_REDIRECT_WINDOW_MS must be milliseconds, got '{}'", v))
            })?;
            cfg.redirect_window = Duration::from_millis(ms);
        }
        cfg.login_page = get("QUIVER_LOGIN_PAGE").filter(|v| !v.trim().is_empty());
        cfg.template_base = get("QUIVER_TEMPLATE_BASE").filter(|v| !v.trim().is_empty());
        Ok(cfg)
    }

    /// Login redirect for a page, honoring the global override.
    pub fn login_target_for(&self, page: Page) -> String {
        self.login_page.clone().unwrap_or_else(|| page.login_target().to_string())
    }

    pub fn template_base(&self) -> &str {
        self.template_base.as_deref().unwrap_or(&self.api_base)
    }
}

/// Parse a base URL for relative joins. The path always ends in `/`, so a prefix such as
/// `https://club.example/api` is kept when `auth/profile` is joined onto it.
pub fn base_url(raw: &str, code: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| AppError::user(code.to_string(), format!("{}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(AppError::user(code.to_string(), format!("{}: not usable as a base URL", raw)));
    }
    Ok(with_trailing_slash(url))
}

pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
