//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with a catch-all proxy handler
//! - Wire up middleware (request id, tracing, timeout)
//! - Bind server to listener with graceful shutdown
//! - Apply route table reloads while serving
//! - Dispatch requests to the routing engine and forward upstream

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ConfigError, ProxyConfig};
use crate::http::forward::{build_client, forward, has_body};
use crate::lifecycle::shutdown;
use crate::modifiers::ModifierFactory;
use crate::observability::metrics;
use crate::rewrite::rewrite;
use crate::routing::view::InboundView;
use crate::routing::{RouteTable, Router as ProxyRouter};
use crate::token;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub client: reqwest::Client,
    pub modifier_timeout: Duration,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    routes: Arc<RouteTable>,
    config: ProxyConfig,
}

impl HttpServer {
    /// Compile the configured routes and build the server.
    ///
    /// Fails when a route target is malformed or a modifier cannot be built.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let provider = token::from_config(&config.identity_token)?;
        let factory = ModifierFactory::new(provider);
        let proxy_router = ProxyRouter::from_config(&config.routes, &factory)?;
        let routes = Arc::new(RouteTable::new(proxy_router, factory));

        let client = build_client(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.request_secs),
        )?;

        let state = AppState {
            routes: routes.clone(),
            client,
            modifier_timeout: Duration::from_secs(config.timeouts.modifier_secs),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            routes,
            config,
        })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        // Outer bound covers the modifier budget plus the upstream timeout.
        let overall = Duration::from_secs(config.timeouts.request_secs + config.timeouts.modifier_secs);

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(overall)),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Every config received on `updates` replaces the route table; a config
    /// that fails to compile is logged and the current routes stay live.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<ProxyConfig>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.load().len(),
            "HTTP server starting"
        );

        if let Some(updates) = updates {
            tokio::spawn(apply_updates(self.routes.clone(), updates, shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Live route table, shared with the reload task.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn apply_updates(
    routes: Arc<RouteTable>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                if let Err(e) = routes.replace(&config.routes) {
                    tracing::error!(error = %e, "Rejected reloaded routes, keeping current table");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Main proxy handler.
/// Resolves the route, rewrites the request and forwards it.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();
    let inbound = InboundView::from_parts(&parts, peer);
    let method = parts.method.to_string();
    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let router = state.routes.load();
    let Some(route) = router.resolve(&inbound) else {
        tracing::warn!(request_id = %request_id, path = %inbound.path(), "No route matched");
        metrics::record_route_miss();
        metrics::record_request(&method, 404, metrics::NO_ROUTE, start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    let route_name = route.selector().name().to_string();
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %inbound.path(),
        route = %route_name,
        "Proxying request"
    );

    let deadline = tokio::time::Instant::now() + state.modifier_timeout;
    let draft = rewrite(route, &inbound, deadline).await;
    let response = forward(&state.client, draft, body, has_body(&parts.headers)).await;

    metrics::record_request(&method, response.status().as_u16(), &route_name, start);
    response
}
