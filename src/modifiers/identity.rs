//! Identity token injection.
//!
//! Fail-open: when the provider errors the request is forwarded without
//! credentials. Upstreams that must not see anonymous traffic have to enforce
//! authorization themselves.

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use std::sync::Arc;
use url::Url;

use crate::modifiers::{Modifier, ModifierContext, ModifierError};
use crate::routing::view::OutboundDraft;
use crate::token::TokenProvider;

/// Sets `Authorization: Bearer <token>` for the route's target audience.
#[derive(Debug, Clone)]
pub struct IdentityToken {
    provider: Arc<dyn TokenProvider>,
}

impl IdentityToken {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

/// Shorthand returning the modifier ready for a selector's chain.
pub fn with_identity_token(provider: Arc<dyn TokenProvider>) -> Arc<dyn Modifier> {
    Arc::new(IdentityToken::new(provider))
}

/// Token audience for a target: `scheme://host[:port]`, without credentials or path.
pub fn audience_for(target: &Url) -> String {
    target.origin().ascii_serialization()
}

#[async_trait]
impl Modifier for IdentityToken {
    fn name(&self) -> &'static str {
        "identity_token"
    }

    async fn apply(
        &self,
        ctx: &ModifierContext<'_>,
        draft: &mut OutboundDraft,
    ) -> Result<(), ModifierError> {
        let audience = audience_for(ctx.target);
        let token = self.provider.fetch(&audience).await?;

        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ModifierError::InvalidHeaderValue(header::AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);
        draft.headers.insert(header::AUTHORIZATION, value);

        tracing::debug!(route = %ctx.route, audience = %audience, "Attached identity token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{StaticTokenProvider, TokenError};
    use axum::http::Request;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::routing::view::InboundView;

    #[derive(Debug, Default)]
    struct CountingFailure {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenProvider for CountingFailure {
        async fn fetch(&self, _audience: &str) -> Result<String, TokenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TokenError::Unavailable("metadata server down".into()))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingProvider {
        audiences: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TokenProvider for RecordingProvider {
        async fn fetch(&self, audience: &str) -> Result<String, TokenError> {
            self.audiences.lock().unwrap().push(audience.to_string());
            Ok("tok".into())
        }
    }

    fn draft_with(headers: &[(&str, &str)]) -> OutboundDraft {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        OutboundDraft::seed(&InboundView::from_request(&builder.body(()).unwrap()))
    }

    fn ctx(target: &Url) -> ModifierContext<'_> {
        ModifierContext {
            route: "test",
            target,
            deadline: Instant::now() + Duration::from_secs(1),
        }
    }

    #[test]
    fn test_audience_strips_credentials_and_path() {
        let target = Url::parse("https://user:pw@svc.internal/base/path?x=1").unwrap();
        assert_eq!(audience_for(&target), "https://svc.internal");

        let target = Url::parse("http://svc.internal:8443/").unwrap();
        assert_eq!(audience_for(&target), "http://svc.internal:8443");
    }

    #[tokio::test]
    async fn test_sets_bearer_overwriting_existing() {
        let target = Url::parse("https://svc.internal/base").unwrap();
        let modifier = IdentityToken::new(Arc::new(StaticTokenProvider::new("abc")));
        let mut draft = draft_with(&[("authorization", "Basic old"), ("authorization", "Basic older")]);

        modifier.apply(&ctx(&target), &mut draft).await.unwrap();
        let values: Vec<_> = draft.headers.get_all(header::AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer abc");
        assert!(values[0].is_sensitive());
    }

    #[tokio::test]
    async fn test_requests_target_audience() {
        let target = Url::parse("https://svc.internal/base").unwrap();
        let provider = Arc::new(RecordingProvider::default());
        let modifier = IdentityToken::new(provider.clone());

        modifier.apply(&ctx(&target), &mut draft_with(&[])).await.unwrap();
        assert_eq!(*provider.audiences.lock().unwrap(), vec!["https://svc.internal"]);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_header() {
        let target = Url::parse("https://svc.internal").unwrap();
        let provider = Arc::new(CountingFailure::default());
        let modifier = IdentityToken::new(provider.clone());
        let mut draft = draft_with(&[]);

        let result = modifier.apply(&ctx(&target), &mut draft).await;
        assert!(matches!(result, Err(ModifierError::Token(_))));
        assert!(draft.headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_with_newline_rejected() {
        let target = Url::parse("https://svc.internal").unwrap();
        let modifier = IdentityToken::new(Arc::new(StaticTokenProvider::new("bad\ntoken")));
        let mut draft = draft_with(&[]);

        assert!(matches!(
            modifier.apply(&ctx(&target), &mut draft).await,
            Err(ModifierError::InvalidHeaderValue(_))
        ));
        assert!(draft.headers.get(header::AUTHORIZATION).is_none());
    }
}
