//! Market Stream Binary
//!
//! Streams real-time market data to stdout.
//!
//! # Usage
//!
//! ```bash
//! market-stream stream stocks T MSFT AAPL
//! market-stream stream crypto XT '*' --output json
//! market-stream channels forex
//! ```
//!
//! # Environment Variables
//!
//! - `MASSIVE_API_KEY`: API key (when `--api-key` is not given)
//! - `MARKET_STREAM_ENDPOINT`: Stream endpoint (default: wss://socket.massive.com)
//! - `MARKET_STREAM_CONFIG`: Config file path
//! - `MARKET_STREAM_LOG`: Log level (default: info)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Extra log filter directives

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod cli;

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use market_stream::infrastructure::config::{FileSettings, default_config_path};
use market_stream::infrastructure::telemetry::{self, TelemetryConfig};
use market_stream::{
    AssetClass, AuthStyle, CredentialLookup, CredentialSource, EventPrinter, StreamClient,
    StreamConfig, SymbolSelection, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command, StreamArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    // Before parsing so `.env` values reach clap's env fallbacks.
    load_dotenv();
    let cli = Cli::parse();

    let _telemetry_guard =
        telemetry::init_with_config(TelemetryConfig::from_env().with_log_level(&cli.log_level))?;

    match cli.command {
        Command::Stream(args) => run_stream(args).await,
        Command::Channels { asset_class } => {
            print_channels(asset_class);
            Ok(())
        }
    }
}

/// Connect, subscribe and print events until interrupted or the server
/// closes the stream.
async fn run_stream(args: StreamArgs) -> anyhow::Result<()> {
    if let Some(port) = args.metrics_port {
        init_metrics(port).context("failed to start metrics listener")?;
    }

    let config = build_config(&args)?;
    tracing::info!(
        url = %config.redacted_url(),
        auth_style = %config.auth_style(),
        output = args.output.as_str(),
        "Configuration loaded"
    );

    // Installed before connecting so an interrupt during the handshake
    // still shuts down cleanly.
    let shutdown = await_shutdown();
    tokio::pin!(shutdown);

    let client = Arc::new(StreamClient::new(config));
    if !start_stream(&client, shutdown.as_mut()).await? {
        tracing::info!("Interrupted before streaming started");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut listener = tokio::spawn({
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        let output = args.output;
        async move {
            let mut printer = EventPrinter::stdout(output);
            client.listen(&mut printer, &cancel).await
        }
    });

    tokio::select! {
        signal = &mut shutdown => {
            signal.context("failed to install signal handlers")?;
            if let Err(e) = client.close().await {
                tracing::warn!(error = %e, "Close did not complete cleanly");
            }

            let timeout = Duration::from_secs(args.shutdown_timeout_secs);
            match tokio::time::timeout(timeout, &mut listener).await {
                Ok(Ok(Ok(outcome))) => tracing::debug!(?outcome, "Listener stopped"),
                Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Listener stopped with error"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Listener task failed"),
                Err(_) => {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "Listener did not stop in time");
                    listener.abort();
                }
            }
            cancel.cancel();
            tracing::info!("Shutdown complete");
            Ok(())
        }
        result = &mut listener => {
            let outcome = result.context("listener task failed")?;
            client.close().await?;
            let outcome = outcome?;
            tracing::info!(?outcome, discarded = client.discarded_frames(), "Stream ended");
            Ok(())
        }
    }
}

/// Connect and subscribe unless `shutdown` resolves first.
///
/// Returns `false` after closing the client when interrupted.
async fn start_stream<F>(client: &StreamClient, shutdown: Pin<&mut F>) -> anyhow::Result<bool>
where
    F: Future<Output = io::Result<()>>,
{
    let started = tokio::select! {
        signal = shutdown => {
            signal.context("failed to install signal handlers")?;
            None
        }
        result = async {
            client.connect().await?;
            client.subscribe_initial().await
        } => Some(result),
    };

    match started {
        Some(result) => {
            result?;
            Ok(true)
        }
        None => {
            if let Err(e) = client.close().await {
                tracing::warn!(error = %e, "Close did not complete cleanly");
            }
            Ok(false)
        }
    }
}

/// Build the stream configuration from flags, environment and config file.
fn build_config(args: &StreamArgs) -> anyhow::Result<StreamConfig> {
    let config_path = args.config.clone().or_else(default_config_path);
    let file = match &config_path {
        Some(path) => FileSettings::load(path)?,
        None => FileSettings::default(),
    };

    let credential = CredentialLookup::from_env()
        .with_config_path(config_path)
        .with_explicit(args.api_key.clone())
        .credential()?;

    let symbols = SymbolSelection::parse(args.symbols.as_slice())?;
    let mut config = StreamConfig::new(credential, args.asset_class, &args.channel, symbols)?;

    if let Some(endpoint) = args.endpoint.clone().or(file.endpoint) {
        config = config.with_endpoint(endpoint);
    }
    if let Some(style) = args.auth_style {
        config = config.with_auth_style(style);
    }
    Ok(config)
}

fn print_channels(asset_class: Option<AssetClass>) {
    let classes = asset_class.map_or_else(|| AssetClass::ALL.to_vec(), |class| vec![class]);
    for class in classes {
        println!("{class}");
        for info in class.channels() {
            let style = class
                .channel(info.code)
                .map_or(AuthStyle::ChallengeAccept, |channel| {
                    AuthStyle::resolve(class, &channel)
                });
            println!("  {:<5} {:<36} auth={style}", info.code, info.description);
        }
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() -> io::Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
    Ok(())
}
