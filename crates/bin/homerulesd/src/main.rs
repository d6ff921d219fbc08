use std::sync::Arc;
use std::time::Duration;

use homerules_adapter_memory::{InMemoryContextStore, InMemoryEntityStore};
use homerules_app::outbound::Outbound;
use homerules_app::services::schedule_service::ScheduleTick;
use homerules_domain::time::{local_now, now};
use homerulesd::config::Config;
use homerulesd::daemon::Daemon;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    let daemon = Daemon::new(
        &config,
        Arc::new(InMemoryEntityStore::new()),
        Arc::new(InMemoryContextStore::new()),
    )?;
    let writer = tokio::spawn(write_outbound(daemon.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(tick = ?config.tick_interval(), "homerulesd started");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(err) = daemon.handle_line(&line, now(), local_now()).await {
                    tracing::warn!(error = %err, "inbound message rejected");
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = daemon.tick(ScheduleTick::default(), local_now()).await {
                    tracing::error!(error = %err, "schedule cycle failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    daemon.shutdown();
    drop(daemon);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer)
        .await
        .is_err()
    {
        tracing::warn!("outbound writer did not drain in time");
    }
    Ok(())
}

/// Print every outbound message as one JSON line on stdout.
async fn write_outbound(mut receiver: broadcast::Receiver<Outbound>) {
    let mut stdout = tokio::io::stdout();
    loop {
        let message = match receiver.recv().await {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "outbound writer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "outbound message not encodable");
                continue;
            }
        };
        let written = async {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await
        };
        if let Err(err) = written.await {
            tracing::error!(error = %err, "stdout closed");
            break;
        }
    }
}
