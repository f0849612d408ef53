//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, evaluated in order (first match wins).
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Identity token provider settings.
    pub identity_token: IdentityTokenConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A route: match rule, upstream target and modifier chain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Upstream base URL (scheme, host, optional path prefix).
    pub target: String,

    /// Match rule. Defaults to matching every request.
    #[serde(default = "default_rule")]
    pub rule: RuleConfig,

    /// Modifiers applied to the outbound request, in order.
    #[serde(default)]
    pub modifiers: Vec<ModifierConfig>,
}

fn default_rule() -> RuleConfig {
    RuleConfig::Always
}

/// Rule DSL as written in config files.
///
/// ```toml
/// rule = { all_of = [{ host_matches = "api.example.com" }, { path_is_at = "/v1" }] }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuleConfig {
    Always,
    PathIsAt(String),
    HostMatches(String),
    HostPathIsAt { host: String, prefix: String },
    MethodMatches(String),
    HasHeader(String),
    HeaderContains { name: String, value: String },
    HasQueryParam(String),
    QueryParamContains { name: String, value: String },
    IpMatches(String),
    StripHeader(String),
    AllOf(Vec<RuleConfig>),
    AnyOf(Vec<RuleConfig>),
}

/// Outbound request modifiers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ModifierConfig {
    /// Attach `Authorization: Bearer <identity token>` for the target's audience.
    IdentityToken,
    /// Set a header, replacing existing values.
    SetHeader { name: String, value: String },
    /// Remove a header.
    RemoveHeader(String),
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Budget for the whole modifier chain of one request, in seconds.
    pub modifier_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            modifier_secs: 5,
        }
    }
}

/// Where identity tokens come from.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenProviderKind {
    /// Instance metadata server (Cloud Run, GCE, GKE).
    Metadata,
    /// Fixed token from configuration. Intended for local runs and tests.
    Static,
}

/// Identity token provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityTokenConfig {
    /// Enable the provider. Routes using `identity_token` require it.
    pub enabled: bool,

    /// Provider implementation.
    pub provider: TokenProviderKind,

    /// Metadata server base URL.
    pub metadata_url: String,

    /// Token returned by the static provider.
    pub static_token: Option<String>,

    /// How long fetched tokens are reused, in seconds.
    pub cache_ttl_secs: u64,

    /// Timeout for a single token fetch, in seconds.
    pub timeout_secs: u64,
}

impl Default for IdentityTokenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: TokenProviderKind::Metadata,
            metadata_url: "http://metadata.google.internal".to_string(),
            static_token: None,
            // Refresh well before the one-hour token expiry.
            cache_ttl_secs: 300,
            timeout_secs: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.routes.is_empty());
        assert!(!config.identity_token.enabled);
        assert_eq!(config.timeouts.modifier_secs, 5);
    }

    #[test]
    fn test_parse_routes() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [identity_token]
            enabled = true
            provider = "static"
            static_token = "dev-token"

            [[routes]]
            name = "private"
            target = "https://private.internal"
            rule = { ip_matches = "10.0.0.5" }
            modifiers = ["identity_token", { set_header = { name = "x-env", value = "prod" } }]

            [[routes]]
            name = "api"
            target = "https://api.internal/base"
            rule = { all_of = [{ host_matches = "example.com" }, { path_is_at = "/api" }, { strip_header = "cookie" }] }

            [[routes]]
            name = "public"
            target = "https://public.internal"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.identity_token.provider, TokenProviderKind::Static);
        assert_eq!(config.routes.len(), 3);
        assert_eq!(config.routes[0].rule, RuleConfig::IpMatches("10.0.0.5".into()));
        assert_eq!(
            config.routes[0].modifiers,
            vec![
                ModifierConfig::IdentityToken,
                ModifierConfig::SetHeader {
                    name: "x-env".into(),
                    value: "prod".into()
                },
            ]
        );
        assert_eq!(
            config.routes[1].rule,
            RuleConfig::AllOf(vec![
                RuleConfig::HostMatches("example.com".into()),
                RuleConfig::PathIsAt("/api".into()),
                RuleConfig::StripHeader("cookie".into()),
            ])
        );
        assert_eq!(config.routes[2].rule, RuleConfig::Always);
    }
}
