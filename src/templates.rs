//! Template fetching with an in-process cache.
//!
//! Pages assemble their markup from shared fragments (`templates/shared/header.html`
//! and friends). Fragments are fetched once per loader and reused. A fragment that
//! fails to load renders as empty and is retried on the next request.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::RwLock;
use reqwest::Url;
use tracing::{debug, error};

use crate::config::base_url;
use crate::error::{AppError, AppResult};

/// Where template text comes from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self, path: &str) -> AppResult<String>;
}

/// Templates served over HTTP relative to a base URL.
#[derive(Clone)]
pub struct HttpTemplateSource {
    base: Url,
    client: reqwest::Client,
}

impl HttpTemplateSource {
    pub fn new(base: &str) -> AppResult<Self> {
        let base = base_url(base, "invalid_template_base")?;
        Ok(Self { base, client: reqwest::Client::new() })
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn fetch(&self, path: &str) -> AppResult<String> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::user("invalid_template_path".to_string(), format!("{}: {}", path, e)))?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::from_status(resp.status().as_u16(), &format!("failed to load template {}", path)));
        }
        Ok(resp.text().await?)
    }
}

/// Templates read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirTemplateSource {
    root: PathBuf,
}

impl DirTemplateSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self { Self { root: root.into() } }
}

#[async_trait]
impl TemplateSource for DirTemplateSource {
    async fn fetch(&self, path: &str) -> AppResult<String> {
        let rel = path.trim_start_matches('/');
        if rel.split('/').any(|seg| seg == "..") {
            return Err(AppError::user("invalid_template_path".to_string(), format!("{} escapes the template root", path)));
        }
        let full = self.root.join(rel);
        tokio::fs::read_to_string(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found("template_not_found".to_string(), full.display().to_string())
            } else {
                e.into()
            }
        })
    }
}

/// `templates/shared/header.html` -> `header`.
pub fn template_name_from_path(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

pub struct TemplateLoader<S: TemplateSource> {
    source: S,
    cache: RwLock<HashMap<String, String>>,
}

impl<S: TemplateSource> TemplateLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source, cache: RwLock::new(HashMap::new()) }
    }

    /// Cached content for `path`, fetching it on first use. Failures are logged and
    /// yield an empty string without being cached.
    pub async fn load(&self, path: &str) -> String {
        if let Some(hit) = self.cache.read().get(path) {
            return hit.clone();
        }
        match self.source.fetch(path).await {
            Ok(content) => {
                debug!(target: "quiver::templates", "loaded template {} ({} bytes)", path, content.len());
                self.cache.write().insert(path.to_string(), content.clone());
                content
            }
            Err(e) => {
                error!(target: "quiver::templates", "error loading template {}: {}", path, e);
                String::new()
            }
        }
    }

    /// Load several templates concurrently, keyed by template name.
    pub async fn load_many<P: AsRef<str>>(&self, paths: &[P]) -> HashMap<String, String> {
        let contents = join_all(paths.iter().map(|p| self.load(p.as_ref()))).await;
        paths
            .iter()
            .zip(contents)
            .map(|(p, c)| (template_name_from_path(p.as_ref()).to_string(), c))
            .collect()
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.read().contains_key(path)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

/// Whether a loaded template set has non-empty content for `name`.
pub fn has_template(templates: &HashMap<String, String>, name: &str) -> bool {
    templates.get(name).map(|t| !t.is_empty()).unwrap_or(false)
}
