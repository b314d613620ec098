// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `booner serve`: HTTP task API, Prometheus exporter, context pruner and
//! health monitor, all stopped together on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use booner_core::application::TaskBoard;
use booner_core::domain::config::resolve_secret;
use booner_core::presentation::api::{self, ApiState};

use crate::embedded::EmbeddedNode;

pub async fn execute(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let node = EmbeddedNode::load(config_path).await?;
    let spec = &node.config.spec;

    if let Some(bind) = &spec.observability.metrics_bind {
        let addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("Invalid metrics bind address '{}'", bind))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics on {}", addr);
    }

    let api_key = spec
        .api
        .api_key
        .as_deref()
        .map(resolve_secret)
        .transpose()
        .context("Failed to resolve API key")?;
    if api_key.is_none() {
        warn!("API key not configured; HTTP API is unauthenticated");
    }

    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| spec.api.bind_address.clone()),
        port.unwrap_or(spec.api.port)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let shutdown = CancellationToken::new();
    let background = node.start_background(shutdown.clone());

    let state = ApiState::new(TaskBoard::new(node.orchestrator.clone()), api_key);
    let mut server = {
        let shutdown = shutdown.clone();
        tokio::spawn(api::serve(listener, state, async move { shutdown.cancelled().await }))
    };

    let served = tokio::select! {
        served = &mut server => served,
        _ = shutdown_signal() => {
            shutdown.cancel();
            server.await
        }
    };
    shutdown.cancel();
    for handle in background {
        let _ = handle.await;
    }

    info!("Booner shutting down");
    served.context("HTTP server task panicked")?.context("HTTP server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
