//! Trivia Sync binary: bridges a newline-delimited transport on stdio to the
//! phase synchronizer and logs every published view.

use std::env;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trivia_sync::{
    config::ClientConfig,
    dto::{action::TokenFrame, view::ClientView},
    services::{runtime::SyncDriver, transport},
};

const FRAME_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::load();
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    // The token goes out before anything else on a fresh connection.
    match env::var("TRIVIA_SYNC_TOKEN") {
        Ok(token) => {
            let frame = serde_json::to_string(&TokenFrame { token }).context("encoding session token")?;
            outbound_tx.send(frame).context("queueing session token")?;
        }
        Err(_) => warn!("TRIVIA_SYNC_TOKEN not set; connecting without a session token"),
    }

    let (driver, handle) = SyncDriver::new(config, frames_rx, outbound_tx);
    let writer = tokio::spawn(transport::write_frames(tokio::io::stdout(), outbound_rx));
    tokio::spawn(transport::read_input(tokio::io::stdin(), frames_tx, handle.clone()));
    tokio::spawn(log_views(handle.subscribe()));

    let mut driver_task = tokio::spawn(driver.run());
    let last_view = tokio::select! {
        result = &mut driver_task => result.context("sync driver task failed")?,
        _ = shutdown_signal() => {
            info!("shutdown requested; leaving the game");
            let _ = handle.leave();
            driver_task.await.context("sync driver task failed")?
        }
    };
    info!(phase = %last_view.phase, halted = last_view.halted, "sync driver stopped");

    writer.await.context("outbound writer task failed")?;
    Ok(())
}

async fn log_views(mut views: watch::Receiver<ClientView>) {
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        match serde_json::to_string(&view) {
            Ok(json) => info!(view = %json, "view updated"),
            Err(err) => warn!(error = %err, "failed to serialize view"),
        }
    }
}

/// Configure tracing subscribers so logs go to stderr, leaving stdout to the
/// transport.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,trivia_sync=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
