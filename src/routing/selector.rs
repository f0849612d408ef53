//! Route selectors: a rule bound to an upstream target and a modifier chain.

use std::sync::Arc;
use url::Url;

use crate::config::RouteConfig;
use crate::modifiers::{Modifier, ModifierFactory};
use crate::routing::rule::Rule;
use crate::routing::RouteError;

/// A compiled route. Immutable once built.
#[derive(Debug, Clone)]
pub struct RouteSelector {
    name: String,
    target: Url,
    rule: Rule,
    modifiers: Vec<Arc<dyn Modifier>>,
}

impl RouteSelector {
    /// Bind `rule` to `target`. Fails if the target is not a usable base URL.
    pub fn new(
        target: &str,
        rule: Rule,
        modifiers: Vec<Arc<dyn Modifier>>,
    ) -> Result<Self, RouteError> {
        let target = parse_target(target)?;
        Ok(Self {
            name: target.as_str().trim_end_matches('/').to_string(),
            target,
            rule,
            modifiers,
        })
    }

    /// Compile a configured route.
    pub fn from_config(config: &RouteConfig, factory: &ModifierFactory) -> Result<Self, RouteError> {
        let modifiers = config
            .modifiers
            .iter()
            .map(|m| factory.build(m))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RouteError::Modifier {
                route: config.name.clone(),
                source,
            })?;

        Ok(Self::new(&config.target, Rule::from_config(&config.rule), modifiers)?
            .named(config.name.clone()))
    }

    /// Name used in logs and metrics. Defaults to the target URL.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn modifiers(&self) -> &[Arc<dyn Modifier>] {
        &self.modifiers
    }
}

/// Shorthand for [`RouteSelector::new`].
pub fn select(
    target: &str,
    rule: Rule,
    modifiers: Vec<Arc<dyn Modifier>>,
) -> Result<RouteSelector, RouteError> {
    RouteSelector::new(target, rule, modifiers)
}

/// Parse an upstream base URL: absolute, `http` or `https`, with a host.
pub fn parse_target(target: &str) -> Result<Url, RouteError> {
    let url = Url::parse(target).map_err(|source| RouteError::InvalidTarget {
        target: target.to_string(),
        source,
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RouteError::UnsupportedScheme {
            target: target.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(RouteError::MissingHost(target.to_string()));
    }
    Ok(url)
}
