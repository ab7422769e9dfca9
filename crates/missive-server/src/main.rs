mod config;

use std::sync::Arc;

use tracing::info;

use missive_api::AppStateInner;
use missive_db::{Context, Store};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "missive=debug,missive_db=debug,missive_api=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let root = Context::background();
    let store = Store::open(&config.db_path)?;
    store.bootstrap(&root).await?;

    let state = Arc::new(AppStateInner {
        store,
        root: root.clone(),
        request_timeout: config.request_timeout,
    });
    let app = missive_api::router(state);

    info!("Missive server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(root))
        .await?;

    info!("Missive server stopped");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then cancels the root context so in-flight
/// store calls abort while axum drains connections.
async fn shutdown_signal(root: Context) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
    root.cancel();
}
