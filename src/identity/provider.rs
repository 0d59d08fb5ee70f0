use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{base_url, with_trailing_slash};
use crate::error::{AppError, AppResult};

use super::principal::{Identity, VerifiedIdentity};

/// Why the remote identity check did not yield an identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token rejected (401)")]
    Unauthorized,
    #[error("token forbidden (403)")]
    Forbidden,
    #[error("identity endpoint failed: {0}")]
    ServerError(String),
    #[error("identity endpoint unreachable: {0}")]
    NetworkError(String),
}

impl VerifyError {
    /// Whether the server rejected the credential itself, as opposed to being unavailable.
    pub fn is_rejection(&self) -> bool {
        matches!(self, VerifyError::Unauthorized | VerifyError::Forbidden)
    }

    /// Classify a non-success status from the identity endpoint.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => VerifyError::Unauthorized,
            StatusCode::FORBIDDEN => VerifyError::Forbidden,
            s => VerifyError::ServerError(format!("HTTP {}", s.as_u16())),
        }
    }
}

/// Remote capability that resolves a bearer token to the server-side identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_identity(&self, token: &str) -> Result<VerifiedIdentity, VerifyError>;
}

/// `GET {base}/auth/profile` with `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct HttpVerifier {
    base: Url,
    client: reqwest::Client,
}

impl HttpVerifier {
    pub fn new(api_base: &str) -> AppResult<Self> {
        let base = base_url(api_base, "invalid_api_base")?;
        Ok(Self { base, client: reqwest::Client::new() })
    }

    pub fn with_client(base: Url, client: reqwest::Client) -> Self {
        Self { base: with_trailing_slash(base), client }
    }

    pub fn profile_url(&self) -> AppResult<Url> {
        self.base
            .join("auth/profile")
            .map_err(|e| AppError::internal("url_join".to_string(), e.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn verify_identity(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let url = self.profile_url().map_err(|e| VerifyError::NetworkError(e.to_string()))?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "quiver::identity", "network error during auth check: {}", e);
                VerifyError::NetworkError(e.to_string())
            })?;
        let status = resp.status();
        debug!(target: "quiver::identity", "profile response status: {}", status);
        if !status.is_success() {
            return Err(VerifyError::from_status(status));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VerifyError::ServerError(format!("unreadable profile body: {}", e)))?;
        Identity::from_response(body).map_err(|e| VerifyError::ServerError(e.to_string()))
    }
}
