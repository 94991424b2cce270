use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::watch;

mod app;
mod auth;
mod bots;
mod config;
mod db;
mod error;
mod menus;
mod orders;
mod relay;
mod state;
#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "orderbot_mgmt=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

async fn shutdown_signal(tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
    let _ = tx.send(true);
}

fn wait_for(mut rx: watch::Receiver<bool>) -> impl std::future::Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("load config")?;
    let state = AppState::init(config).await?;
    let http_addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
    let relay_addr: SocketAddr = state.config.relay.listen_addr.parse()?;

    sqlx::migrate!("./migrations/primary")
        .run(state.db.pool())
        .await
        .context("primary migrations")?;
    sqlx::migrate!("./migrations/published")
        .run(state.published_db.pool())
        .await
        .context("published migrations")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(shutdown_signal(stop_tx));

    let http = app::serve("http", http_addr, app::build_app(state.clone()), wait_for(stop_rx.clone()));
    let relay = app::serve("relay", relay_addr, app::build_relay(&state), wait_for(stop_rx));

    tokio::try_join!(http, relay)?;
    Ok(())
}
