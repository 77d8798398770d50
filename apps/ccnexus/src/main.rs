use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn log_filter(level: u8) -> EnvFilter {
    let directive = match level {
        0 => "debug",
        1 => "info",
        2 => "warn",
        _ => "error",
    };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let boot = ccnexus_core::bootstrap_from_env().await?;
    let global = boot.state.global.load();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(global.log_level))
        .init();

    if global.no_proxy {
        tracing::info!("CCNEXUS_NO_PROXY set, proxy server disabled");
        return Ok(());
    }

    let upstream_cfg = ccnexus_core::upstream_client::UpstreamClientConfig::from_global(&global);
    let state_for_proxy = boot.state.clone();
    let upstream = Arc::new(ccnexus_core::upstream_client::WreqUpstreamClient::new_with_proxy_resolver(
        upstream_cfg,
        move || state_for_proxy.global.load().forward_proxy.clone(),
    )?);
    let engine = Arc::new(ccnexus_core::ProxyEngine::new(boot.state.clone(), upstream));

    let app = ccnexus_router::proxy_router(engine);

    let bind = format!("0.0.0.0:{}", global.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "ccnexus listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
