//! Rule-based reverse proxy library.
//!
//! Routes are ordered `(target, rule, modifiers)` selectors. A request is
//! matched against each rule in turn; the first hit is rewritten onto its
//! target and passed through the route's modifier chain.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod modifiers;
pub mod observability;
pub mod rewrite;
pub mod routing;
pub mod token;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use modifiers::{with_identity_token, Modifier, ModifierError};
pub use routing::{select, InboundView, OutboundDraft, RouteError, RouteSelector, Router};
pub use token::{TokenError, TokenProvider};
