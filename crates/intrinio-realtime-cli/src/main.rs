/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Inbound records printed as JSON lines, quote/trade counters
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

mod config;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use intrinio_realtime::RealtimeClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::StreamConfig;
use crate::stats::{RecordKind, StreamStats};

#[derive(Parser, Debug)]
#[command(name = "intrinio-stream", version, about = "Intrinio realtime feed reader")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Replaces the configured channels; repeat for several
    #[arg(long = "channel", value_name = "CHANNEL")]
    channels: Vec<String>,
    #[arg(long = "provider", value_name = "PROVIDER")]
    provider: Option<String>,
    #[arg(long = "duration-secs", value_name = "SECS")]
    duration_secs: Option<u64>,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting intrinio-stream"
    );

    let config = load_config(&args)?;
    info!(
        provider = %config.provider,
        channel_count = config.channels.len(),
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let stats = Arc::new(StreamStats::default());
    let mut client = RealtimeClient::with_config(
        config.credentials(),
        config.provider()?,
        config.client_config(),
    )
    .context("create realtime client")?;

    let quote_stats = stats.clone();
    client.on_quote(move |record| {
        if quote_stats.record(record) == RecordKind::Control {
            debug!(event = record.event_name().unwrap_or("-"), "control frame");
            return;
        }
        match serde_json::to_string(record.fields()) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(error = %err, "failed to encode record"),
        }
    });
    let error_stats = stats.clone();
    client.on_error(move |err| {
        error_stats.error();
        error!(error = %err, fatal = err.is_fatal(), "realtime error");
    });

    client.connect().await.context("connect")?;
    client.join(&config.channels);
    info!(channels = ?config.channels, "channels joined");

    wait_for_stop(&shutdown, config.duration()).await;

    client.leave_all();
    if let Err(err) = client.disconnect().await {
        warn!(error = %err, "disconnect did not complete cleanly");
    }

    info!(
        quotes = stats.quotes(),
        trades = stats.trades(),
        errors = stats.errors(),
        "stream finished"
    );
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(args: &Cli) -> Result<StreamConfig> {
    let path_str = args
        .config_path
        .to_str()
        .context("config path must be valid utf-8")?;
    let mut config = StreamConfig::from_file(path_str).context("load config")?;

    if !args.channels.is_empty() {
        config.channels = args.channels.clone();
    }
    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    if args.duration_secs.is_some() {
        config.duration_secs = args.duration_secs;
    }

    config.validate().context("validate config")?;
    Ok(config)
}

async fn wait_for_stop(shutdown: &CancellationToken, duration: Option<Duration>) {
    match duration {
        Some(duration) => {
            tokio::select! {
                _ = shutdown.cancelled() => info!("shutdown signal received"),
                _ = tokio::time::sleep(duration) => {
                    info!(secs = duration.as_secs(), "run duration elapsed");
                }
            }
        }
        None => {
            shutdown.cancelled().await;
            info!("shutdown signal received");
        }
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
