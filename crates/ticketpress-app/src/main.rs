// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketpress: order-to-printer bridge.
//
// Entry point. Initialises logging, opens the stores, starts the print
// scheduler and the order poller, then serves the HTTP API until SIGINT or
// SIGTERM.

mod data_dir;
mod error;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use ticketpress_core::AppConfig;
use ticketpress_core::error::Result;
use ticketpress_ingest::{Poller, WooClient};

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Ticketpress starting");

    let dir = data_dir::data_dir()?;
    let config = AppConfig::load(&data_dir::config_path(&dir))?;
    if config.webhook_secret.is_none() {
        warn!("no webhook secret configured; every webhook delivery will be rejected");
    }

    let state = AppState::open(&config, &dir)?;
    state.scheduler.start().await?;

    let poller = Poller::new(
        WooClient::new(config.woocommerce.clone())?,
        Arc::clone(&state.reconciler),
        Duration::from_secs(config.poll_interval_secs.max(1)),
    );
    if config.woocommerce.is_configured() {
        poller.start().await;
    } else {
        info!("WooCommerce API not configured; relying on webhooks only");
    }

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, data_dir = %dir.display(), "HTTP API listening");

    let served = axum::serve(listener, routes::build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    poller.stop().await;
    state.scheduler.stop().await;
    info!("Ticketpress stopped");

    served.map_err(Into::into)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown requested");
}
