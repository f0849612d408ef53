//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled selectors in configuration order
//! - Find the first selector whose rule matches the request
//! - Seed the outbound draft and fold in the winning rewrites
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) ordered scan; later selectors are never evaluated after a hit
//! - Explicit `None` rather than a silent default route

use crate::config::RouteConfig;
use crate::modifiers::ModifierFactory;
use crate::routing::selector::RouteSelector;
use crate::routing::view::{InboundView, OutboundDraft};
use crate::routing::RouteError;

/// Ordered, immutable route table.
#[derive(Debug, Default, Clone)]
pub struct Router {
    selectors: Vec<RouteSelector>,
}

/// The winning selector together with the request draft prepared for it.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    selector: &'a RouteSelector,
    draft: OutboundDraft,
}

impl<'a> RouteMatch<'a> {
    pub fn selector(&self) -> &'a RouteSelector {
        self.selector
    }

    /// Draft with the rule's rewrites already applied.
    pub fn draft(&self) -> &OutboundDraft {
        &self.draft
    }

    pub fn into_parts(self) -> (&'a RouteSelector, OutboundDraft) {
        (self.selector, self.draft)
    }
}

impl Router {
    pub fn new(selectors: Vec<RouteSelector>) -> Self {
        Self { selectors }
    }

    /// Compile configured routes, keeping their order.
    pub fn from_config(routes: &[RouteConfig], factory: &ModifierFactory) -> Result<Self, RouteError> {
        let selectors = routes
            .iter()
            .map(|route| RouteSelector::from_config(route, factory))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(selectors))
    }

    /// Resolve the request to the first matching selector.
    ///
    /// This is the only place evaluation order is decided. Rewrites of the
    /// winning branch are applied exactly once, to a draft seeded from `req`.
    pub fn resolve(&self, req: &InboundView) -> Option<RouteMatch<'_>> {
        let mut rewrites = Vec::new();
        for selector in &self.selectors {
            rewrites.clear();
            if !selector.rule().evaluate(req, &mut rewrites) {
                continue;
            }

            let mut draft = OutboundDraft::seed(req);
            for rewrite in &rewrites {
                rewrite.apply(&mut draft);
            }
            tracing::trace!(
                route = %selector.name(),
                path = %req.path(),
                rewritten = %draft.path(),
                "Route matched"
            );
            return Some(RouteMatch { selector, draft });
        }
        None
    }

    pub fn selectors(&self) -> &[RouteSelector] {
        &self.selectors
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}
