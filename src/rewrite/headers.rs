//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (including those named by `Connection`)
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//!
//! # Design Decisions
//! - The client chain in X-Forwarded-For is extended, never replaced
//! - X-Forwarded-Host and X-Forwarded-Proto describe this hop only

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::routing::view::InboundView;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers meaningful only for a single transport-level connection.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed.iter().map(String::as_str).chain(HOP_BY_HOP) {
        headers.remove(name);
    }
}

/// Record where the request came from.
pub fn set_forwarding_headers(headers: &mut HeaderMap, inbound: &InboundView) {
    match HeaderValue::from_str(inbound.host()) {
        Ok(host) if !host.is_empty() => {
            headers.insert(X_FORWARDED_HOST, host);
        }
        _ => {}
    }
    if let Ok(proto) = HeaderValue::from_str(inbound.scheme()) {
        headers.insert(X_FORWARDED_PROTO, proto);
    }

    let Some(peer) = inbound.peer() else {
        return;
    };
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let chain = if prior.is_empty() {
        peer.ip().to_string()
    } else {
        format!("{}, {}", prior.join(", "), peer.ip())
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
