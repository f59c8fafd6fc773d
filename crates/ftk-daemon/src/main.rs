//! ftk-daemon entry point.
//!
//! Thin: loads config, sets up tracing, builds the shared state, wires
//! middleware and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ftk_config::{load_layered_yaml, report_unused_keys, ConfigRole, ControllerConfig, UnusedKeyPolicy};
use ftk_daemon::{routes, state};
use ftk_notify::TracingNotifier;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = load_config()?;
    let shared = Arc::new(
        state::AppState::from_config(&cfg)
            .context("daemon state")?
            .with_notifier(Arc::new(TracingNotifier)),
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or_else(|| cfg.server.addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
    info!("ftk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `FTK_CONFIG` is a comma-separated list of YAML layers, base first.
/// Unset means built-in defaults.
fn load_config() -> anyhow::Result<ControllerConfig> {
    let Ok(raw) = std::env::var("FTK_CONFIG") else {
        info!("FTK_CONFIG not set; using defaults");
        return Ok(ControllerConfig::default());
    };
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let loaded = load_layered_yaml(&paths).context("load FTK_CONFIG")?;
    let report = report_unused_keys(ConfigRole::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused {
        debug!(key = %key, "config key not read by the daemon");
    }
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    loaded.controller()
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("FTK_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
