//! Back-office gate HTTP service entry point.
//!
//! # Purpose
//! Loads configuration, builds the session gate and upstream proxy, then
//! serves the gated router alongside the metrics listener.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use gate::app::{AppState, build_router};
use gate::config::GateConfig;
use gate::gate::SessionGate;
use gate::observability;
use gate::proxy::UpstreamProxy;
use std::future::Future;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GateConfig::from_env_or_yaml().context("gate config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: GateConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("backoffice-gate")?;
    let state = build_state(&config)?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        metrics = %config.metrics_bind,
        upstream = %config.upstream_url,
        issuer = %config.session.issuer,
        "session gate listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

fn build_state(config: &GateConfig) -> anyhow::Result<AppState> {
    let gate = SessionGate::from_config(&config.session, &config.routes)?;
    let proxy = UpstreamProxy::new(config.upstream_url.clone()).context("build upstream proxy")?;
    Ok(AppState { gate, proxy })
}
