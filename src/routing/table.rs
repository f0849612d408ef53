//! Live route table with wholesale replacement on reload.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::config::RouteConfig;
use crate::modifiers::ModifierFactory;
use crate::routing::router::Router;
use crate::routing::RouteError;

/// Holds the active `Router`. Readers take a snapshot; reloads swap it atomically.
#[derive(Debug)]
pub struct RouteTable {
    live: ArcSwap<Router>,
    factory: ModifierFactory,
}

impl RouteTable {
    pub fn new(router: Router, factory: ModifierFactory) -> Self {
        Self {
            live: ArcSwap::from_pointee(router),
            factory,
        }
    }

    /// Snapshot of the current router. In-flight requests keep theirs across reloads.
    pub fn load(&self) -> Arc<Router> {
        self.live.load_full()
    }

    /// Compile `routes` and make them live. On error the current table stays.
    pub fn replace(&self, routes: &[RouteConfig]) -> Result<(), RouteError> {
        let router = Router::from_config(routes, &self.factory)?;
        tracing::info!(routes = router.len(), "Route table replaced");
        self.live.store(Arc::new(router));
        Ok(())
    }
}
