//! Entry point for the `bebop-gateway` HTTP server.

use std::sync::Arc;

use bebop_gateway::{
    config::GatewayConfig,
    routes::{create_router, AppState},
};
use bebop_sandbox::WasiCompiler;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let compiler = match WasiCompiler::from_file(&config.module_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load compiler module");
            std::process::exit(1);
        }
    };

    let state = AppState::new(Arc::new(compiler), &config.program_name);
    let invoker = Arc::clone(&state.invoker);
    let app = create_router(state, config.max_body_bytes);

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %config.listen_addr, module = %config.module_path.display(), "bebop-gateway listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }

    // Responses may have finished before their compiler runs did.
    invoker.tracker().drain().await;
    info!("all invocations settled");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
