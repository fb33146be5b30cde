#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Stream - Real-time Market Data Client
//!
//! Holds one WebSocket connection to the market data push feed, subscribes
//! to a channel and delivers every decoded record to a handler.
//!
//! # Layers (inside to outside)
//!
//! - **Domain**: Core types, no I/O
//!   - `subscription`: Asset classes, channels, subscription strings
//!   - `streaming`: Event records and timestamp normalization
//!
//! - **Application**: Ports and services
//!   - `ports`: `EventHandler`, `CredentialSource`
//!   - `services`: Event rendering
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: WebSocket client, auth, codec, wire messages
//!   - `config`: Stream configuration and credential lookup
//!   - `metrics`: Prometheus counters
//!   - `telemetry`: Logging and optional OTLP export
//!
//! # Data Flow
//!
//! ```text
//! StreamConfig -> StreamClient::connect -> subscribe -> listen -> close
//!                                                         |
//!                                             EventHandler::on_event
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{MarketEvent, StatusMessage, normalize_timestamp};
pub use domain::subscription::{
    AssetClass, Channel, ChannelInfo, SubscriptionError, SymbolSelection, WILDCARD, build_params,
};

// Ports and services
pub use application::ports::{CredentialSource, EventHandler};
pub use application::services::{EventPrinter, OutputMode};

// Infrastructure config
pub use infrastructure::config::{ConfigError, CredentialLookup, DEFAULT_ENDPOINT, StreamConfig};

// Stream client
pub use infrastructure::stream::{
    AuthError, AuthStyle, ConnectionState, Credential, ListenOutcome, StreamClient, StreamError,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
