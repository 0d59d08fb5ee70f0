use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::AppResult;
use crate::identity::{
    FileStore, HttpVerifier, IdentityVerifier, LogNavigator, Page, RedirectGate, SessionGuard, SessionStore,
};
use crate::profiles::ProfileClient;
use crate::templates::{DirTemplateSource, HttpTemplateSource, TemplateLoader};

/// Everything a command needs to talk to the club API from this machine.
pub struct ClientContext {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub navigator: Arc<LogNavigator>,
    pub redirect: Arc<RedirectGate>,
}

impl ClientContext {
    pub fn connect(config: Config) -> AppResult<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(&config.state_file));
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(HttpVerifier::new(&config.api_base)?);
        let navigator = Arc::new(LogNavigator::new());
        let redirect = Arc::new(RedirectGate::with_window(navigator.clone(), config.redirect_window));
        debug!(
            target: "quiver::cli",
            "client context api={} state={}",
            config.api_base, config.state_file.display()
        );
        Ok(Self { config, store, verifier, navigator, redirect })
    }

    pub fn guard_for(&self, page: Page) -> SessionGuard {
        SessionGuard::new(
            self.store.clone(),
            self.verifier.clone(),
            self.redirect.clone(),
            self.config.login_target_for(page),
        )
    }

    /// Profiles client for `page`; an ended session redirects to that page's login.
    pub fn profiles(&self, page: Page) -> AppResult<ProfileClient> {
        Ok(ProfileClient::new(&self.config.api_base, self.store.clone())?
            .with_redirect(self.redirect.clone(), self.config.login_target_for(page)))
    }
}

/// Either template source, picked from the configured base.
pub enum AnyTemplateLoader {
    Http(TemplateLoader<HttpTemplateSource>),
    Dir(TemplateLoader<DirTemplateSource>),
}

impl AnyTemplateLoader {
    /// URLs load over HTTP; anything else is treated as a directory.
    pub fn for_base(base: &str) -> AppResult<Self> {
        if base.starts_with("http://") || base.starts_with("https://") {
            Ok(AnyTemplateLoader::Http(TemplateLoader::new(HttpTemplateSource::new(base)?)))
        } else {
            Ok(AnyTemplateLoader::Dir(TemplateLoader::new(DirTemplateSource::new(Path::new(base)))))
        }
    }

    pub async fn load_many(&self, paths: &[String]) -> std::collections::HashMap<String, String> {
        match self {
            AnyTemplateLoader::Http(l) => l.load_many(paths).await,
            AnyTemplateLoader::Dir(l) => l.load_many(paths).await,
        }
    }
}
