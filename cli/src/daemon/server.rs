// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Manager HTTP server

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use picoclaw_core::{
    application::lifecycle::TenantLifecycleService,
    domain::manager_config::ManagerConfig,
    infrastructure::runtime::DockerRuntime,
    presentation::api::{app, AppState},
};

pub async fn start_server(config_path: Option<PathBuf>) -> Result<()> {
    // Load configuration
    let config = ManagerConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    info!(
        product = %config.product,
        image = %config.image,
        network = %config.network_name(),
        provider = %config.provider,
        policy = ?config.create_policy,
        "Configuration loaded"
    );

    let runtime = DockerRuntime::new(config.docker_socket_path.clone(), config.runtime_timeout())
        .context("Failed to initialize Docker runtime")?;

    // The engine may come up after the manager; requests will report 503 until it does
    if let Err(e) = runtime.healthcheck().await {
        warn!("Docker healthcheck failed: {}", e);
    }

    let lifecycle = TenantLifecycleService::from_config(&config, Arc::new(runtime))
        .context("Failed to initialize lifecycle service")?;

    let router = app(AppState::new(lifecycle, config.manager_token.as_str()));

    // Start HTTP server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Manager listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Manager shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
