//! Request views used by the routing engine.
//!
//! # Design Decisions
//! - `InboundView` is read-only; every predicate sees the same snapshot
//! - `OutboundDraft` is request-scoped and written only by rewrites and modifiers
//! - Non-UTF-8 header values and broken query strings read as "absent"

use axum::http::{header, request::Parts, HeaderMap, Method, Request, Uri};
use std::borrow::Cow;
use std::net::SocketAddr;
use url::Url;

/// Header carrying the client chain added by upstream proxies.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Immutable snapshot of the routing-relevant parts of an inbound request.
#[derive(Debug, Clone)]
pub struct InboundView {
    method: Method,
    scheme: String,
    host: String,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    peer: Option<SocketAddr>,
}

impl InboundView {
    /// Build a view from request parts as handed over by the listener.
    pub fn from_parts(parts: &Parts, peer: Option<SocketAddr>) -> Self {
        Self::build(&parts.method, &parts.uri, &parts.headers, peer)
    }

    /// Build a view from a whole request, ignoring the body.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::build(req.method(), req.uri(), req.headers(), None)
    }

    fn build(method: &Method, uri: &Uri, headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default();

        Self {
            method: method.clone(),
            scheme: uri.scheme_str().unwrap_or("http").to_string(),
            host,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: headers.clone(),
            peer,
        }
    }

    /// Attach the address of the connected peer.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host as transmitted (Host header, falling back to the URI authority).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// All textual values of a header. Invalid names yield nothing.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .get_all(name)
            .into_iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Every value recorded for `name` in the query string.
    pub fn query_values(&self, name: &str) -> Vec<Cow<'_, str>> {
        let Some(query) = self.query.as_deref() else {
            return Vec::new();
        };
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value)
            .collect()
    }

    /// First entry of the first `X-Forwarded-For` line, trimmed. An opaque
    /// first line yields `None`.
    pub fn forwarded_client_ip(&self) -> Option<&str> {
        self.headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
    }
}

/// Mutable working copy of the request being prepared for an upstream.
#[derive(Debug, Clone)]
pub struct OutboundDraft {
    pub method: Method,
    pub headers: HeaderMap,
    path: String,
    query: Option<String>,
    target: Option<Url>,
}

impl OutboundDraft {
    /// Seed a draft from the inbound request. The target is unset until rewrite.
    pub fn seed(inbound: &InboundView) -> Self {
        Self {
            method: inbound.method().clone(),
            headers: inbound.headers().clone(),
            path: inbound.path().to_string(),
            query: inbound.query().map(str::to_string),
            target: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Upstream base URL, once the rewriter has pointed the draft at one.
    pub fn target(&self) -> Option<&Url> {
        self.target.as_ref()
    }

    pub(crate) fn set_target(&mut self, target: Url) {
        self.target = Some(target);
    }

    /// Full upstream URL: target scheme and authority with the draft path and query.
    ///
    /// The query keeps its parameters and order but is serialized as a URL
    /// query, so bytes in the query encode set (such as `'`) come out
    /// percent-encoded. Already-encoded sequences are left alone.
    pub fn url(&self) -> Option<Url> {
        let mut url = self.target.clone()?;
        url.set_path(&self.path);
        url.set_query(self.query.as_deref());
        url.set_fragment(None);
        Some(url)
    }
}
