//! Outbound request modifiers.
//!
//! # Data Flow
//! ```text
//! Rewritten OutboundDraft
//!     → run_modifiers (selector order, shared deadline)
//!         → identity.rs (Authorization: Bearer <token>)
//!         → headers.rs (set / remove headers)
//!     → Draft ready for transport
//! ```
//!
//! # Design Decisions
//! - A failing modifier is logged and skipped; the request still forwards
//! - Every modifier runs under the request's modifier deadline
//! - Modifiers are built once per route, at compile time

pub mod headers;
pub mod identity;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use url::Url;

use crate::config::ModifierConfig;
use crate::observability::metrics;
use crate::routing::view::OutboundDraft;
use crate::token::{TokenError, TokenProvider};

pub use headers::{RemoveHeader, SetHeader};
pub use identity::{audience_for, with_identity_token, IdentityToken};

/// Errors a modifier may report. None of them fail the request.
#[derive(Debug, Error)]
pub enum ModifierError {
    #[error("token provider failed: {0}")]
    Token(#[from] TokenError),

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("identity_token modifier requires an identity token provider")]
    MissingTokenProvider,
}

/// Per-request facts a modifier may depend on.
#[derive(Debug, Clone, Copy)]
pub struct ModifierContext<'a> {
    /// Name of the winning route.
    pub route: &'a str,
    /// Base URL of the winning route's upstream.
    pub target: &'a Url,
    /// Point in time after which no modifier may still be running.
    pub deadline: Instant,
}

/// A post-rewrite transformation of the outbound request.
#[async_trait]
pub trait Modifier: Send + Sync + fmt::Debug {
    /// Short identifier used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn apply(
        &self,
        ctx: &ModifierContext<'_>,
        draft: &mut OutboundDraft,
    ) -> Result<(), ModifierError>;
}

/// Run `modifiers` in order. Failures and timeouts are logged, never propagated.
pub async fn run_modifiers(
    modifiers: &[Arc<dyn Modifier>],
    ctx: &ModifierContext<'_>,
    draft: &mut OutboundDraft,
) {
    for modifier in modifiers {
        match timeout_at(ctx.deadline, modifier.apply(ctx, draft)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    route = %ctx.route,
                    modifier = modifier.name(),
                    error = %e,
                    "Modifier failed, forwarding without it"
                );
                metrics::record_modifier_failure(modifier.name());
            }
            Err(_) => {
                tracing::warn!(
                    route = %ctx.route,
                    modifier = modifier.name(),
                    "Modifier deadline exceeded, forwarding without it"
                );
                metrics::record_modifier_failure(modifier.name());
            }
        }
    }
}

/// Builds modifiers from configuration.
#[derive(Debug, Clone, Default)]
pub struct ModifierFactory {
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl ModifierFactory {
    pub fn new(token_provider: Option<Arc<dyn TokenProvider>>) -> Self {
        Self { token_provider }
    }

    pub fn build(&self, config: &ModifierConfig) -> Result<Arc<dyn Modifier>, ModifierError> {
        Ok(match config {
            ModifierConfig::IdentityToken => {
                let provider = self
                    .token_provider
                    .clone()
                    .ok_or(ModifierError::MissingTokenProvider)?;
                with_identity_token(provider)
            }
            ModifierConfig::SetHeader { name, value } => Arc::new(SetHeader::new(name, value)?),
            ModifierConfig::RemoveHeader(name) => Arc::new(RemoveHeader::new(name)?),
        })
    }
}
