//! Metadata-server identity tokens (Cloud Run, GCE, GKE).
//!
//! Tokens are cached per audience for a fixed TTL. Expired entries are
//! replaced on the next fetch for that audience.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::token::{TokenError, TokenProvider};

const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: Instant,
}

/// Fetches identity tokens from the instance metadata server.
#[derive(Debug)]
pub struct MetadataTokenProvider {
    client: reqwest::Client,
    endpoint: String,
    ttl: Duration,
    cache: DashMap<String, CachedToken>,
}

impl MetadataTokenProvider {
    /// `base_url` is the metadata server root, e.g. `http://metadata.google.internal`.
    pub fn new(base_url: &str, timeout: Duration, ttl: Duration) -> Result<Self, TokenError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), IDENTITY_PATH),
            ttl,
            cache: DashMap::new(),
        })
    }

    fn cached(&self, audience: &str) -> Option<String> {
        self.cache
            .get(audience)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.token.clone())
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn fetch(&self, audience: &str) -> Result<String, TokenError> {
        if let Some(token) = self.cached(audience) {
            return Ok(token);
        }

        let res = self
            .client
            .get(&self.endpoint)
            .query(&[("audience", audience), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(TokenError::Status(status.as_u16()));
        }

        let token = res.text().await?.trim().to_string();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        tracing::debug!(audience = %audience, "Fetched identity token");
        self.cache.insert(
            audience.to_string(),
            CachedToken {
                token: token.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(token)
    }
}
