//! `waypoint serve`: run served workflows on HTTP request.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::http::router::build_router;
use crate::state::{AppState, build_engine, resolve_config};

pub async fn handle_serve(dir: &Path, host: &str, port: u16, config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path).await?;
    let engine = build_engine(&config)?;
    let workflows = AppState::load_workflows(dir)?;

    if workflows.is_empty() {
        tracing::warn!(dir = %dir.display(), "no workflows found");
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!();
    println!(
        "  {} Waypoint trigger listening on {}",
        style("⚡").bold(),
        style(format!("http://{addr}")).cyan()
    );
    for name in workflows.keys() {
        println!("    POST /workflows/{}/runs", style(name).green());
    }
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let router = build_router(AppState::new(engine, workflows));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
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
                tracing::warn!("failed to install SIGTERM handler: {e}");
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
}
