//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{extract::Request, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use rule_proxy::config::{ProxyConfig, RouteConfig, RuleConfig};
use rule_proxy::http::HttpServer;
use rule_proxy::lifecycle::Shutdown;

/// Start a backend that echoes what it received as JSON, tagged with `name`.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move |req: Request| async move {
        let header = |key: &str| {
            req.headers()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "backend": name,
            "method": req.method().as_str(),
            "path": req.uri().path(),
            "query": req.uri().query(),
            "host": header("host"),
            "authorization": header("authorization"),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_request_id": header("x-request-id"),
        }))
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).expect("proxy config should compile");
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, None, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

pub fn route(name: &str, backend: SocketAddr, rule: RuleConfig) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        target: format!("http://{backend}"),
        rule,
        modifiers: vec![],
    }
}

/// GET `path` through the proxy and decode the echoed JSON.
pub async fn get_json(proxy: SocketAddr, path: &str) -> (u16, Value) {
    let response = reqwest::get(format!("http://{proxy}{path}")).await.unwrap();
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}
