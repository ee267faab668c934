//! Coach - runs the training loop or an arena match.

use anyhow::Result;
use clap::Parser;
use coach::commands::{run_pit, run_train};
use coach::config::{Cli, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    init_tracing(cli.log_level())?;
    info!(log_level = %cli.log_level(), "Tracing initialized");

    // Setup graceful shutdown
    let cancel = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&cancel);
    let shutdown_handle = tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        info!("Shutdown signal received, finishing current work...");
        shutdown_flag.store(true, Ordering::Relaxed);
    });

    // Search is CPU-bound; keep it off the async workers.
    let run_result = tokio::task::spawn_blocking(move || match cli.command {
        Command::Train(config) => run_train(&config, cancel).map(|summary| {
            info!(
                iterations = summary.iterations_run,
                accepted = summary.accepted,
                rejected = summary.rejected,
                episodes = summary.episodes,
                dropped_episodes = summary.dropped_episodes,
                last_win_rate = ?summary.last_win_rate,
                cancelled = summary.cancelled,
                "Training run complete"
            );
        }),
        Command::Pit(config) => run_pit(&config, cancel).map(|report| {
            info!(
                games = report.games(),
                one_won = report.one_won,
                two_won = report.two_won,
                "Arena complete"
            );
        }),
    })
    .await?;

    shutdown_handle.abort();

    match run_result {
        Ok(()) => {
            info!("Coach completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Coach failed: {:#}", e);
            Err(e)
        }
    }
}
