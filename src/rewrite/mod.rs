//! Request rewriting for the winning route.
//!
//! # Data Flow
//! ```text
//! RouteMatch (selector + draft with rule rewrites folded in)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → point draft at the selector's target, set Host
//!     → path.rs (join target base path with rewritten request path)
//!     → modifiers (selector order, bounded by deadline)
//!     → OutboundDraft ready for transport
//! ```
//!
//! # Design Decisions
//! - Fixed step order; each step runs once per request
//! - Rule rewrites are applied by the router, never again here
//! - Total: a rewrite never fails, modifiers only degrade

pub mod headers;
pub mod path;

use axum::http::{header, HeaderValue};
use tokio::time::Instant;

use crate::modifiers::{run_modifiers, ModifierContext};
use crate::routing::router::RouteMatch;
use crate::routing::selector::RouteSelector;
use crate::routing::view::{InboundView, OutboundDraft};

pub use path::join_paths;

/// Apply the core rewrite: forwarding headers, target swap and path join.
pub fn prepare(selector: &RouteSelector, inbound: &InboundView, draft: &mut OutboundDraft) {
    headers::strip_hop_by_hop(&mut draft.headers);
    headers::set_forwarding_headers(&mut draft.headers, inbound);

    let target = selector.target();
    if let Some(authority) = target_authority(target) {
        if let Ok(host) = HeaderValue::from_str(&authority) {
            draft.headers.insert(header::HOST, host);
        }
    }

    let joined = join_paths(target.path(), draft.path());
    draft.set_path(joined);
    draft.set_target(target.clone());
}

/// Produce the outbound request for a resolved route.
pub async fn rewrite(route: RouteMatch<'_>, inbound: &InboundView, deadline: Instant) -> OutboundDraft {
    let (selector, mut draft) = route.into_parts();
    prepare(selector, inbound, &mut draft);

    let ctx = ModifierContext {
        route: selector.name(),
        target: selector.target(),
        deadline,
    };
    run_modifiers(selector.modifiers(), &ctx, &mut draft).await;

    tracing::debug!(
        route = %selector.name(),
        upstream = %draft.url().map(|u| u.to_string()).unwrap_or_default(),
        "Request rewritten"
    );
    draft
}

fn target_authority(target: &url::Url) -> Option<String> {
    let host = target.host_str()?;
    Some(match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
