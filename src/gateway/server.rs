use super::AppState;
use super::handlers::{handle_health, handle_story_gap};
use crate::config::Config;
use crate::story::StoryGapPipeline;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn run_gateway(config: &Config) -> Result<()> {
    let gateway = &config.gateway;
    if is_public_bind(&gateway.host) {
        tracing::warn!(
            host = gateway.host.as_str(),
            "gateway is bound to a non-loopback address; every request spends oracle credits"
        );
    }

    let addr: SocketAddr = format!("{}:{}", gateway.host, gateway.port)
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    let pipeline = Arc::new(StoryGapPipeline::from_config(config));
    run_gateway_with_listener(listener, pipeline, config).await
}

/// Serves from a pre-bound listener.
pub async fn run_gateway_with_listener(
    listener: tokio::net::TcpListener,
    pipeline: Arc<StoryGapPipeline>,
    config: &Config,
) -> Result<()> {
    let local = listener
        .local_addr()
        .context("get gateway listener local address")?;
    print_gateway_banner(local, pipeline.models());
    let timeout = config.gateway_timeout();
    tracing::info!(addr = %local, timeout_secs = timeout.as_secs(), "gateway listening");

    let app = build_app(AppState { pipeline }, config.gateway.max_body_bytes, timeout);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve HTTP gateway")?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}

fn print_gateway_banner(addr: SocketAddr, models: &[String]) {
    println!("Gateway listening on {addr}");
    println!("  POST /api/story-gap");
    println!("  GET  /health");
    println!("  models: {}", models.join(", "));
}

pub fn build_app(state: AppState, max_body_bytes: usize, timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/story-gap", post(handle_story_gap))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
}
