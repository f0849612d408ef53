//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, host, path, query, headers)
//!     → view.rs (read-only InboundView)
//!     → router.rs (ordered selector scan)
//!     → rule.rs (evaluate predicate tree, collect winning rewrites)
//!     → Return: RouteMatch (selector + seeded OutboundDraft) or None
//!
//! Route Compilation (at startup / reload):
//!     RouteConfig[]
//!     → rule.rs (RuleConfig → Rule)
//!     → selector.rs (parse target, build modifiers)
//!     → Freeze as immutable Router
//!     → table.rs (atomic swap into the live table)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - First match wins, in configuration order
//! - Matching never mutates; rewrites run once, after the scan settles
//! - Malformed targets fail compilation, never a request

pub mod router;
pub mod rule;
pub mod selector;
pub mod table;
pub mod view;

use thiserror::Error;

pub use router::{RouteMatch, Router};
pub use rule::{
    all_of, always, any_of, has_header, has_query_param, header_contains, host_matches,
    host_path_is_at, ip_matches, method_matches, path_is_at, query_param_contains, strip_header,
    Predicate, Rewrite, Rule,
};
pub use selector::{select, RouteSelector};
pub use table::RouteTable;
pub use view::{InboundView, OutboundDraft};

/// Errors raised while building selectors and routers.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Target is not a parseable absolute URL.
    #[error("invalid target URL '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    /// Target uses a scheme the proxy cannot forward to.
    #[error("unsupported scheme '{scheme}' in target '{target}'")]
    UnsupportedScheme { target: String, scheme: String },

    /// Target has no host to forward to.
    #[error("target '{0}' has no host")]
    MissingHost(String),

    /// A route's modifier list could not be built.
    #[error("route '{route}': {source}")]
    Modifier {
        route: String,
        #[source]
        source: crate::modifiers::ModifierError,
    },
}
