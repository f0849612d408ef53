//! Route matching logic.
//!
//! # Responsibilities
//! - Evaluate primitive predicates against an `InboundView`
//! - Compose rules with `all_of` / `any_of` (left to right, short-circuit)
//! - Collect the rewrites of the branch that produced the match
//!
//! # Design Decisions
//! - Path matching is segment aware: `/api` matches `/api/x`, never `/apix`
//! - Host, method, header and query comparisons are exact and case-sensitive
//! - Evaluation is a single pass; rewrites are applied later, once
//! - No regex to guarantee O(n) matching

use crate::config::RuleConfig;
use crate::routing::view::{InboundView, OutboundDraft};

/// A pure condition over the inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    /// Normalized prefix: leading slash, no trailing slash, empty for root.
    PathIsAt(String),
    HostMatches(String),
    MethodMatches(String),
    HasHeader(String),
    HeaderContains { name: String, value: String },
    HasQueryParam(String),
    QueryParamContains { name: String, value: String },
    IpMatches(String),
}

impl Predicate {
    /// Returns true if the request satisfies this condition.
    pub fn matches(&self, req: &InboundView) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::PathIsAt(prefix) => strip_path_prefix(req.path(), prefix).is_some(),
            Predicate::HostMatches(host) => req.host() == host.as_str(),
            Predicate::MethodMatches(method) => req.method().as_str() == method.as_str(),
            Predicate::HasHeader(name) => req.headers().contains_key(name.as_str()),
            Predicate::HeaderContains { name, value } => {
                req.header_values(name).any(|v| v == value.as_str())
            }
            Predicate::HasQueryParam(name) => !req.query_values(name).is_empty(),
            Predicate::QueryParamContains { name, value } => {
                req.query_values(name).iter().any(|v| v == value.as_str())
            }
            Predicate::IpMatches(ip) => req.forwarded_client_ip() == Some(ip.as_str()),
        }
    }
}

/// Side effect on the outbound draft, owned by a leaf rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    TrimPrefix(String),
    StripHeader(String),
}

impl Rewrite {
    pub fn apply(&self, draft: &mut OutboundDraft) {
        match self {
            Rewrite::TrimPrefix(prefix) => {
                // Trims relative to the draft, which earlier rewrites may have changed.
                if let Some(rest) = strip_path_prefix(draft.path(), prefix) {
                    let trimmed = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
                    draft.set_path(trimmed);
                }
            }
            Rewrite::StripHeader(name) => {
                draft.headers.remove(name.as_str());
            }
        }
    }
}

/// A predicate tree with rewrites attached to its leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Leaf {
        predicate: Predicate,
        rewrite: Option<Rewrite>,
    },
    AllOf(Vec<Rule>),
    AnyOf(Vec<Rule>),
}

impl Rule {
    /// Returns true if the request satisfies the rule.
    pub fn matches(&self, req: &InboundView) -> bool {
        self.evaluate(req, &mut Vec::new())
    }

    /// Evaluate the rule, pushing the rewrites of the matching branch onto
    /// `rewrites` in application order. On a miss `rewrites` is left as it was.
    pub fn evaluate<'a>(&'a self, req: &InboundView, rewrites: &mut Vec<&'a Rewrite>) -> bool {
        let mark = rewrites.len();
        match self {
            Rule::Leaf { predicate, rewrite } => {
                if !predicate.matches(req) {
                    return false;
                }
                rewrites.extend(rewrite.iter());
                true
            }
            Rule::AllOf(children) => {
                for child in children {
                    if !child.evaluate(req, rewrites) {
                        rewrites.truncate(mark);
                        return false;
                    }
                }
                true
            }
            Rule::AnyOf(children) => children.iter().any(|child| child.evaluate(req, rewrites)),
        }
    }

    /// Compile a configured rule tree.
    pub fn from_config(config: &RuleConfig) -> Self {
        match config {
            RuleConfig::Always => always(),
            RuleConfig::PathIsAt(prefix) => path_is_at(prefix.as_str()),
            RuleConfig::HostMatches(host) => host_matches(host.as_str()),
            RuleConfig::HostPathIsAt { host, prefix } => {
                host_path_is_at(host.as_str(), prefix.as_str())
            }
            RuleConfig::MethodMatches(method) => method_matches(method.as_str()),
            RuleConfig::HasHeader(name) => has_header(name.as_str()),
            RuleConfig::HeaderContains { name, value } => {
                header_contains(name.as_str(), value.as_str())
            }
            RuleConfig::HasQueryParam(name) => has_query_param(name.as_str()),
            RuleConfig::QueryParamContains { name, value } => {
                query_param_contains(name.as_str(), value.as_str())
            }
            RuleConfig::IpMatches(ip) => ip_matches(ip.as_str()),
            RuleConfig::StripHeader(name) => strip_header(name.as_str()),
            RuleConfig::AllOf(children) => all_of(children.iter().map(Rule::from_config)),
            RuleConfig::AnyOf(children) => any_of(children.iter().map(Rule::from_config)),
        }
    }
}

fn leaf(predicate: Predicate) -> Rule {
    Rule::Leaf {
        predicate,
        rewrite: None,
    }
}

/// Matches every request.
pub fn always() -> Rule {
    leaf(Predicate::Always)
}

/// Matches a path-segment prefix and trims it from the outbound path.
pub fn path_is_at(prefix: impl Into<String>) -> Rule {
    let prefix = normalize_prefix(&prefix.into());
    Rule::Leaf {
        predicate: Predicate::PathIsAt(prefix.clone()),
        rewrite: (!prefix.is_empty()).then_some(Rewrite::TrimPrefix(prefix)),
    }
}

pub fn host_matches(host: impl Into<String>) -> Rule {
    leaf(Predicate::HostMatches(host.into()))
}

pub fn host_path_is_at(host: impl Into<String>, prefix: impl Into<String>) -> Rule {
    all_of([host_matches(host), path_is_at(prefix)])
}

pub fn method_matches(method: impl Into<String>) -> Rule {
    leaf(Predicate::MethodMatches(method.into()))
}

pub fn has_header(name: impl Into<String>) -> Rule {
    leaf(Predicate::HasHeader(name.into().to_ascii_lowercase()))
}

pub fn header_contains(name: impl Into<String>, value: impl Into<String>) -> Rule {
    leaf(Predicate::HeaderContains {
        name: name.into().to_ascii_lowercase(),
        value: value.into(),
    })
}

pub fn has_query_param(name: impl Into<String>) -> Rule {
    leaf(Predicate::HasQueryParam(name.into()))
}

pub fn query_param_contains(name: impl Into<String>, value: impl Into<String>) -> Rule {
    leaf(Predicate::QueryParamContains {
        name: name.into(),
        value: value.into(),
    })
}

/// Matches the first `X-Forwarded-For` entry.
pub fn ip_matches(ip: impl Into<String>) -> Rule {
    leaf(Predicate::IpMatches(ip.into()))
}

/// Always matches and removes `name` from the outbound request.
pub fn strip_header(name: impl Into<String>) -> Rule {
    Rule::Leaf {
        predicate: Predicate::Always,
        rewrite: Some(Rewrite::StripHeader(name.into().to_ascii_lowercase())),
    }
}

pub fn all_of(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::AllOf(rules.into_iter().collect())
}

pub fn any_of(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::AnyOf(rules.into_iter().collect())
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Remainder of `path` after a segment-aligned `prefix`.
fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn get(uri: &str) -> InboundView {
        InboundView::from_request(&Request::builder().uri(uri).body(()).unwrap())
    }

    fn with_header(uri: &str, name: &str, value: &str) -> InboundView {
        InboundView::from_request(
            &Request::builder()
                .uri(uri)
                .header(name, value)
                .body(())
                .unwrap(),
        )
    }

    /// Runs the rule and applies the collected rewrites to a fresh draft.
    fn rewritten_path(rule: &Rule, req: &InboundView) -> Option<String> {
        let mut rewrites = Vec::new();
        if !rule.evaluate(req, &mut rewrites) {
            return None;
        }
        let mut draft = OutboundDraft::seed(req);
        for rewrite in rewrites {
            rewrite.apply(&mut draft);
        }
        Some(draft.path().to_string())
    }

    #[test]
    fn test_path_is_at_respects_segments() {
        let rule = path_is_at("/api");
        assert!(rule.matches(&get("http://a.test/api/x")));
        assert!(rule.matches(&get("http://a.test/api")));
        assert!(rule.matches(&get("http://a.test/api/")));
        assert!(!rule.matches(&get("http://a.test/apix")));
        assert!(!rule.matches(&get("http://a.test/other/api")));
    }

    #[test]
    fn test_path_prefix_normalized() {
        assert_eq!(path_is_at("api/"), path_is_at("/api"));
        assert!(path_is_at("/").matches(&get("http://a.test/anything")));
        assert_eq!(
            rewritten_path(&path_is_at("/"), &get("http://a.test/keep/me")).as_deref(),
            Some("/keep/me")
        );
    }

    #[test]
    fn test_path_trim() {
        let rule = path_is_at("/api");
        assert_eq!(rewritten_path(&rule, &get("/api/widgets")).as_deref(), Some("/widgets"));
        assert_eq!(rewritten_path(&rule, &get("/api")).as_deref(), Some("/"));
        assert_eq!(rewritten_path(&rule, &get("/apix")), None);
    }

    #[test]
    fn test_all_of_trims_once() {
        let rule = all_of([always(), path_is_at("/x")]);
        assert_eq!(rewritten_path(&rule, &get("/x/y")).as_deref(), Some("/y"));

        let mut rewrites = Vec::new();
        assert!(rule.evaluate(&get("/x/y"), &mut rewrites));
        assert_eq!(rewrites, vec![&Rewrite::TrimPrefix("/x".into())]);
    }

    #[test]
    fn test_all_of_short_circuits_and_discards() {
        let rule = all_of([path_is_at("/x"), host_matches("nope.test")]);
        let mut rewrites = Vec::new();
        assert!(!rule.evaluate(&get("http://a.test/x/y"), &mut rewrites));
        assert!(rewrites.is_empty());
    }

    #[test]
    fn test_any_of_uses_first_match() {
        let rule = any_of([path_is_at("/a"), path_is_at("/b")]);
        assert_eq!(rewritten_path(&rule, &get("/b/z")).as_deref(), Some("/z"));
        assert_eq!(rewritten_path(&rule, &get("/c/z")), None);
    }

    #[test]
    fn test_any_of_nested_discards_failed_branch() {
        let rule = any_of([
            all_of([path_is_at("/a"), has_header("x-never")]),
            path_is_at("/a/b"),
        ]);
        assert_eq!(rewritten_path(&rule, &get("/a/b/c")).as_deref(), Some("/c"));
    }

    #[test]
    fn test_empty_composites() {
        assert!(Rule::AllOf(Vec::new()).matches(&get("/")));
        assert!(!Rule::AnyOf(Vec::new()).matches(&get("/")));
    }

    #[test]
    fn test_host_path_is_at() {
        let rule = host_path_is_at("a.test", "/api");
        assert_eq!(
            rewritten_path(&rule, &get("http://a.test/api/v1")).as_deref(),
            Some("/v1")
        );
        assert!(!rule.matches(&get("http://b.test/api/v1")));
    }

    #[test]
    fn test_host_is_exact() {
        let rule = host_matches("a.test");
        assert!(rule.matches(&get("http://a.test/")));
        assert!(!rule.matches(&get("http://a.test:8080/")));
        assert!(!rule.matches(&get("http://sub.a.test/")));
    }

    #[test]
    fn test_method_is_case_sensitive() {
        let post = InboundView::from_request(
            &Request::builder().method("POST").uri("/").body(()).unwrap(),
        );
        assert!(method_matches("POST").matches(&post));
        assert!(!method_matches("post").matches(&post));
        assert!(!method_matches("GET").matches(&post));
    }

    #[test]
    fn test_header_predicates() {
        let req = with_header("/", "X-My-Header", "");
        assert!(has_header("X-My-Header").matches(&req));
        assert!(!has_header("X-Other").matches(&req));
        assert!(!has_header("bad header").matches(&req));

        let req = InboundView::from_request(
            &Request::builder()
                .uri("/")
                .header("X-Tier", "bronze")
                .header("X-Tier", "gold")
                .body(())
                .unwrap(),
        );
        assert!(header_contains("x-tier", "gold").matches(&req));
        assert!(!header_contains("x-tier", "Gold").matches(&req));
        assert!(!header_contains("x-missing", "gold").matches(&req));
    }

    #[test]
    fn test_query_predicates() {
        let req = get("/search?tag=a&tag=b&flag");
        assert!(has_query_param("tag").matches(&req));
        assert!(has_query_param("flag").matches(&req));
        assert!(!has_query_param("other").matches(&req));
        assert!(query_param_contains("tag", "b").matches(&req));
        assert!(!query_param_contains("tag", "c").matches(&req));
    }

    #[test]
    fn test_malformed_query_is_no_match() {
        let req = get("/search?%zz=%%&=");
        assert!(!query_param_contains("tag", "a").matches(&req));
        assert!(!has_query_param("tag").matches(&req));
    }

    #[test]
    fn test_ip_matches_first_entry() {
        let rule = ip_matches("10.0.0.5");
        assert!(rule.matches(&with_header("/", "X-Forwarded-For", "10.0.0.5, 10.0.0.1")));
        assert!(!rule.matches(&with_header("/", "X-Forwarded-For", "10.0.0.1, 10.0.0.5")));
        assert!(!rule.matches(&get("/")));
    }

    #[test]
    fn test_ip_matches_opaque_first_line() {
        let req = InboundView::from_request(
            &Request::builder()
                .uri("/")
                .header("x-forwarded-for", HeaderValue::from_bytes(b"\xff1.2.3.4").unwrap())
                .header("x-forwarded-for", "10.0.0.5")
                .body(())
                .unwrap(),
        );
        assert_eq!(req.forwarded_client_ip(), None);
        assert!(!ip_matches("10.0.0.5").matches(&req));
    }

    #[test]
    fn test_opaque_header_value() {
        let req = InboundView::from_request(
            &Request::builder()
                .uri("/")
                .header("x-tier", HeaderValue::from_bytes(b"\xffgold").unwrap())
                .body(())
                .unwrap(),
        );
        assert!(has_header("x-tier").matches(&req));
        assert!(!header_contains("x-tier", "\u{ff}gold").matches(&req));
        assert!(!header_contains("x-tier", "gold").matches(&req));
    }

    #[test]
    fn test_strip_header_rewrite() {
        let rule = all_of([path_is_at("/api"), strip_header("X-Internal")]);
        let req = with_header("/api/x", "x-internal", "secret");
        let mut rewrites = Vec::new();
        assert!(rule.evaluate(&req, &mut rewrites));

        let mut draft = OutboundDraft::seed(&req);
        for rewrite in rewrites {
            rewrite.apply(&mut draft);
        }
        assert!(!draft.headers.contains_key("x-internal"));
        assert_eq!(draft.path(), "/x");
    }

    #[test]
    fn test_from_config() {
        let config = RuleConfig::AnyOf(vec![
            RuleConfig::IpMatches("10.0.0.5".into()),
            RuleConfig::HostPathIsAt {
                host: "a.test".into(),
                prefix: "/api".into(),
            },
        ]);
        assert_eq!(
            Rule::from_config(&config),
            any_of([ip_matches("10.0.0.5"), host_path_is_at("a.test", "/api")])
        );
    }
}
