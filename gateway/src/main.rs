//! Tasker API Gateway

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tasker_common::SystemClock;
use tasker_config::AppConfig;
use tasker_gateway::{cache, rate_limit, routing, shutdown, state};
use tasker_telemetry::{init_metrics, init_tracing};
use tracing::{info, warn};

const CONFIG_DIR: &str = "config";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 文件可选
    let _ = dotenvy::dotenv();

    // 配置错误直接退出
    let config = AppConfig::load(CONFIG_DIR).context("Failed to load configuration")?;
    init_tracing(
        &config.telemetry.log_level,
        config.telemetry.json || config.is_production(),
    );

    let metrics = init_metrics().context("Failed to install Prometheus recorder")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let sweep_interval = config.rate_limit.sweep.interval();

    let state = state::AppState::build(config, Arc::new(SystemClock))
        .context("Invalid rate limit configuration")?
        .with_metrics(metrics);

    if state.engine.is_enabled() {
        for tier in rate_limit::QuotaTier::ALL {
            let policy = state.engine.policy(tier);
            info!(
                tier = %tier,
                window_secs = policy.window.as_secs(),
                max_requests = policy.max_requests,
                "Rate limit tier configured"
            );
        }
    } else {
        warn!("Rate limiting is DISABLED, every request will be admitted");
    }

    let sweeper = rate_limit::spawn_sweeper(state.engine.clone(), sweep_interval);
    let purger = cache::spawn_purger(state.cache.clone(), sweep_interval);

    info!(
        app_env = %state.config.app_env,
        cache_ttl_secs = state.config.cache.ttl_secs,
        "Starting gateway"
    );

    let app = routing::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::shutdown_signal())
    .await
    .context("Server error")?;

    sweeper.abort();
    purger.abort();
    info!("Gateway stopped");
    Ok(())
}
