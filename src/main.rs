//! rule-proxy
//!
//! A reverse proxy that picks an upstream by evaluating ordered route rules.
//!
//! ```text
//!   Client ──▶ http server ──▶ RouteTable ──▶ Router::resolve
//!                                               │ first matching selector
//!                                               ▼
//!                                  rewrite (headers, target, path)
//!                                               │
//!                                               ▼
//!                                  modifiers (identity token, headers)
//!                                               │
//!   Client ◀── streamed response ◀── reqwest ◀──┘──▶ Upstream
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use rule_proxy::config::{
    load_config, ConfigWatcher, ModifierConfig, ProxyConfig, RouteConfig, RuleConfig,
};
use rule_proxy::lifecycle::{shutdown_signal, Shutdown};
use rule_proxy::observability::{init_logging, metrics};
use rule_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "rule-proxy", version, about = "Rule-based reverse proxy")]
struct Args {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if args.config.is_none() {
        apply_env_routes(
            &mut config,
            env_var("PUBLIC_URL").as_deref(),
            env_var("PRIVATE_URL").as_deref(),
            env_var("PRIVATE_CLIENT_ID").as_deref(),
        );
    }
    apply_port_override(&mut config, env_var("PORT").as_deref());

    init_logging(&config.observability.log_level);
    tracing::info!("rule-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(updates))
        }
        None => (None, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let serving = server.run(listener, updates, shutdown.subscribe());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    serving.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Routes for running without a config file.
///
/// The private client (first `X-Forwarded-For` entry) goes to `private_url`,
/// everything else to `public_url`. Both attach a metadata identity token.
fn apply_env_routes(
    config: &mut ProxyConfig,
    public_url: Option<&str>,
    private_url: Option<&str>,
    private_client: Option<&str>,
) {
    let Some(public_url) = public_url else {
        return;
    };

    if let (Some(private_url), Some(client)) = (private_url, private_client) {
        config.routes.push(RouteConfig {
            name: "private".into(),
            target: private_url.to_string(),
            rule: RuleConfig::IpMatches(client.trim().to_string()),
            modifiers: vec![ModifierConfig::IdentityToken],
        });
    }
    config.routes.push(RouteConfig {
        name: "public".into(),
        target: public_url.to_string(),
        rule: RuleConfig::Always,
        modifiers: vec![ModifierConfig::IdentityToken],
    });
    config.identity_token.enabled = true;
}

/// `PORT` replaces the port of the configured bind address.
fn apply_port_override(config: &mut ProxyConfig, port: Option<&str>) {
    let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) else {
        return;
    };
    let host = config
        .listener
        .bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("0.0.0.0");
    config.listener.bind_address = format!("{host}:{port}");
}
