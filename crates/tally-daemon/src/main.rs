//! tally-daemon entry point.
//!
//! Loads the layered configuration, seeds the session store, wires
//! middleware, and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tally_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env()?;
    let (cfg, config_hash) =
        tally_config::load_config(&paths).context("loading daemon configuration")?;
    info!(
        config_hash = %config_hash,
        polling_stations = cfg.polling_stations.len(),
        "configuration loaded"
    );

    let shared = Arc::new(state::AppState::from_config(&cfg, config_hash));

    state::spawn_heartbeat(
        shared.bus.clone(),
        Duration::from_secs(cfg.daemon.heartbeat_secs.max(1)),
    );
    state::spawn_status_forwarder(Arc::clone(&shared));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(addr) => addr,
        None => cfg
            .daemon
            .addr
            .parse()
            .with_context(|| format!("invalid daemon.addr {:?}", cfg.daemon.addr))?,
    };
    info!("tally-daemon listening on http://{}", addr);

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

/// `TALLY_CONFIG` holds one or more YAML paths separated by commas, applied
/// in order.
fn config_paths_from_env() -> anyhow::Result<Vec<String>> {
    let raw = std::env::var("TALLY_CONFIG").context("TALLY_CONFIG is not set")?;
    let paths: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if paths.is_empty() {
        anyhow::bail!("TALLY_CONFIG names no files");
    }
    Ok(paths)
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("TALLY_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

/// CORS: localhost origins only, bare or on the dev-server ports.
fn cors_localhost_only() -> CorsLayer {
    const HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];
    const PORTS: [Option<u16>; 3] = [None, Some(3000), Some(5173)];

    let origins: Vec<HeaderValue> = HOSTS
        .iter()
        .flat_map(|host| {
            PORTS.iter().map(move |port| match port {
                Some(port) => format!("http://{host}:{port}"),
                None => format!("http://{host}"),
            })
        })
        .filter_map(|o| HeaderValue::from_str(&o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
