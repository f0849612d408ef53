//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request id, trace, timeout)
//!     → routing (RouteTable snapshot → Router::resolve)
//!     → rewrite (headers, target, path, modifiers)
//!     → forward.rs (reqwest upstream call, streamed response)
//!     → Send to client
//! ```

pub mod forward;
pub mod server;

pub use forward::{build_client, forward};
pub use server::{AppState, HttpServer};
