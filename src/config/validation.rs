//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check route targets, header names and methods before compiling
//! - Check that routes only use modifiers the provider setup supports
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::{HeaderName, HeaderValue, Method};
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{
    ModifierConfig, ProxyConfig, RouteConfig, RuleConfig, TokenProviderKind,
};
use crate::routing::selector::parse_target;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener bind address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("metrics address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("route #{0} has an empty name")]
    EmptyRouteName(usize),

    #[error("route name '{0}' is used more than once")]
    DuplicateRouteName(String),

    #[error("route '{route}': {reason}")]
    InvalidTarget { route: String, reason: String },

    #[error("route '{route}': invalid header name '{header}'")]
    InvalidHeaderName { route: String, header: String },

    #[error("route '{route}': invalid value for header '{header}'")]
    InvalidHeaderValue { route: String, header: String },

    #[error("route '{route}': invalid method '{method}'")]
    InvalidMethod { route: String, method: String },

    #[error("route '{route}': path prefix '{prefix}' must start with '/'")]
    InvalidPathPrefix { route: String, prefix: String },

    #[error("route '{0}' uses identity_token but the identity token provider is disabled")]
    IdentityTokenDisabled(String),

    #[error("identity token provider 'static' requires static_token")]
    MissingStaticToken,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    for (name, value) in [
        ("connect_secs", config.timeouts.connect_secs),
        ("request_secs", config.timeouts.request_secs),
        ("modifier_secs", config.timeouts.modifier_secs),
        ("identity_token.timeout_secs", config.identity_token.timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    let token = &config.identity_token;
    if token.enabled
        && token.provider == TokenProviderKind::Static
        && token.static_token.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::MissingStaticToken);
    }

    let mut seen = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyRouteName(index));
        } else if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(route.name.clone()));
        }
        validate_route(route, token.enabled, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, tokens_enabled: bool, errors: &mut Vec<ValidationError>) {
    if let Err(e) = parse_target(&route.target) {
        errors.push(ValidationError::InvalidTarget {
            route: route.name.clone(),
            reason: e.to_string(),
        });
    }

    validate_rule(&route.name, &route.rule, errors);

    for modifier in &route.modifiers {
        match modifier {
            ModifierConfig::IdentityToken => {
                if !tokens_enabled {
                    errors.push(ValidationError::IdentityTokenDisabled(route.name.clone()));
                }
            }
            ModifierConfig::SetHeader { name, value } => {
                check_header_name(&route.name, name, errors);
                if HeaderValue::from_str(value).is_err() {
                    errors.push(ValidationError::InvalidHeaderValue {
                        route: route.name.clone(),
                        header: name.clone(),
                    });
                }
            }
            ModifierConfig::RemoveHeader(name) => check_header_name(&route.name, name, errors),
        }
    }
}

fn validate_rule(route: &str, rule: &RuleConfig, errors: &mut Vec<ValidationError>) {
    match rule {
        RuleConfig::Always
        | RuleConfig::HostMatches(_)
        | RuleConfig::HasQueryParam(_)
        | RuleConfig::QueryParamContains { .. }
        | RuleConfig::IpMatches(_) => {}
        RuleConfig::PathIsAt(prefix) | RuleConfig::HostPathIsAt { prefix, .. } => {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidPathPrefix {
                    route: route.to_string(),
                    prefix: prefix.clone(),
                });
            }
        }
        RuleConfig::MethodMatches(method) => {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    route: route.to_string(),
                    method: method.clone(),
                });
            }
        }
        RuleConfig::HasHeader(name)
        | RuleConfig::HeaderContains { name, .. }
        | RuleConfig::StripHeader(name) => check_header_name(route, name, errors),
        RuleConfig::AllOf(children) | RuleConfig::AnyOf(children) => {
            for child in children {
                validate_rule(route, child, errors);
            }
        }
    }
}

fn check_header_name(route: &str, name: &str, errors: &mut Vec<ValidationError>) {
    if HeaderName::from_bytes(name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName {
            route: route.to_string(),
            header: name.to_string(),
        });
    }
}
