use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use market_stream::{AssetClass, AuthStyle, OutputMode};

/// Market Stream - real-time market data from the command line.
///
/// Connects to the push feed, subscribes to one channel and prints every
/// event until interrupted. Logs go to stderr, events to stdout.
#[derive(Parser, Debug)]
#[command(name = "market-stream", version, about)]
pub(crate) struct Cli {
    /// Log level for this tool (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "MARKET_STREAM_LOG")]
    pub(crate) log_level: String,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Stream events for symbols on a channel
    Stream(StreamArgs),

    /// List the channels each asset class offers
    Channels {
        /// Only list this asset class
        asset_class: Option<AssetClass>,
    },
}

#[derive(Args, Debug)]
pub(crate) struct StreamArgs {
    /// Asset class: stocks, options, indices, crypto, forex or futures
    pub(crate) asset_class: AssetClass,

    /// Channel code, e.g. T, Q, AM, A, XT, C
    pub(crate) channel: String,

    /// Symbols to subscribe to, space or comma separated; `*` for all
    pub(crate) symbols: Vec<String>,

    /// Stream endpoint
    #[arg(long, env = "MARKET_STREAM_ENDPOINT")]
    pub(crate) endpoint: Option<String>,

    /// API key (falls back to MASSIVE_API_KEY, then the config file)
    #[arg(long)]
    pub(crate) api_key: Option<String>,

    /// Override the authentication style: query or challenge
    #[arg(long)]
    pub(crate) auth_style: Option<AuthStyle>,

    /// Output format: table or json
    #[arg(long, default_value = "table")]
    pub(crate) output: OutputMode,

    /// Seconds to wait for the listener after an interrupt
    #[arg(long, default_value_t = 3)]
    pub(crate) shutdown_timeout_secs: u64,

    /// Serve Prometheus metrics on this port
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) metrics_port: Option<u16>,

    /// Config file (default: $MARKET_STREAM_CONFIG or ~/.config/market-stream/config.toml)
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
}
