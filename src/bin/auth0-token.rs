use std::time::Duration;

use anyhow::{Context, Result};
use auth0_token_cache::auth0::{RefreshOutcome, TokenClient};
use auth0_token_cache::server;
use auth0_token_cache::utils::config_loader;
use auth0_token_cache::utils::logging;
use auth0_token_cache::utils::logging::LogLevel;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "auth0-token.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a currently valid token to stdout
    Get,
    /// Regenerate the cached token when it expires within the refresh-ahead window
    Refresh,
    /// Refresh periodically and serve metrics until interrupted
    Watch {
        #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 300)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level).await?;

    // -------------------------------
    // 2. Wire adapters
    // -------------------------------

    let client = TokenClient::from_config(&service_config).context("failed to build token client")?;

    let result = match args.command {
        Command::Get => {
            let token = client.get_token().await?;
            println!("{}", token);
            Ok(())
        }
        Command::Refresh => {
            match client.refresh_token().await? {
                RefreshOutcome::Refreshed => info!("token refreshed"),
                RefreshOutcome::NotExpiringSoon => info!("token not expiring soon, nothing to do"),
            }
            Ok(())
        }
        Command::Watch { interval_secs } => watch_loop(&client, &service_config, interval_secs).await,
    };

    // -------------------------------
    // 3. Let best-effort work finish before exiting
    // -------------------------------

    client.background().drain().await;
    result
}

async fn watch_loop(
    client: &TokenClient,
    service_config: &auth0_token_cache::ServiceConfig,
    interval_secs: u64,
) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let mut server_shutdown = shutdown_rx.clone();
    let settings = service_config.settings.clone();
    let http_server = tokio::spawn(async move {
        server::server::start(&settings, async move {
            let _ = server_shutdown.changed().await;
        })
        .await
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        let _ = shutdown_tx.send(true);
    });

    info!(interval_secs, "Service starting...");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.refresh_token().await {
                    Ok(outcome) => info!(?outcome, "refresh cycle done"),
                    Err(e) => error!(error = %e, "refresh cycle failed"),
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    http_server.await.context("metrics server task panicked")?
}
