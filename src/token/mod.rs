//! Identity token providers.
//!
//! # Responsibilities
//! - Hand out bearer tokens for a given audience
//! - Own caching and expiry of fetched tokens
//!
//! # Design Decisions
//! - Providers are passed explicitly to the modifiers that use them
//! - A provider never retries; a failed fetch is reported to the caller
//! - Fetches are bounded by the provider's own timeout

pub mod metadata;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{IdentityTokenConfig, TokenProviderKind};

pub use metadata::MetadataTokenProvider;

/// Errors that can occur while acquiring a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// HTTP request to the token endpoint failed.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Token endpoint answered with a non-success status.
    #[error("token endpoint returned status {0}")]
    Status(u16),

    /// Token endpoint answered with an empty body.
    #[error("token endpoint returned an empty token")]
    Empty,

    /// Provider cannot serve tokens at all.
    #[error("token provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of identity tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync + std::fmt::Debug {
    /// Return a bearer token for `audience`.
    async fn fetch(&self, audience: &str) -> Result<String, TokenError>;
}

/// Provider returning the same token for every audience.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch(&self, _audience: &str) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }
}

/// Build the configured provider, or `None` when identity tokens are disabled.
pub fn from_config(
    config: &IdentityTokenConfig,
) -> Result<Option<Arc<dyn TokenProvider>>, TokenError> {
    if !config.enabled {
        return Ok(None);
    }

    let provider: Arc<dyn TokenProvider> = match config.provider {
        TokenProviderKind::Static => {
            let token = config
                .static_token
                .clone()
                .ok_or_else(|| TokenError::Unavailable("static_token is not set".into()))?;
            Arc::new(StaticTokenProvider::new(token))
        }
        TokenProviderKind::Metadata => Arc::new(MetadataTokenProvider::new(
            &config.metadata_url,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.cache_ttl_secs),
        )?),
    };

    tracing::info!(provider = ?config.provider, "Identity token provider ready");
    Ok(Some(provider))
}
