//! Prometheus Metrics Module
//!
//! Counters for the streaming client. Recording is a no-op until a
//! recorder is installed, so the library can be used without metrics.
//!
//! # Metrics
//!
//! - `market_stream_frames_received_total`: frames read off the socket
//! - `market_stream_events_delivered_total`: records handed to the handler
//! - `market_stream_frames_discarded_total`: frames that failed to decode
//! - `market_stream_control_frames_sent_total`: auth/subscribe/unsubscribe frames
//! - `market_stream_connections_total`: connection attempts by outcome
//!
//! # Integration
//!
//! With `--metrics-port` the CLI serves `/metrics` on that port.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::subscription::AssetClass;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Calling this more than once is a no-op. Must run inside a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener or recorder can not be installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()?;
    register_metrics();
    let _ = INSTALLED.set(());

    tracing::info!(port, "Prometheus metrics listener started");
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "market_stream_frames_received_total",
        "Total frames received from the stream"
    );
    describe_counter!(
        "market_stream_events_delivered_total",
        "Total event records delivered to the handler"
    );
    describe_counter!(
        "market_stream_frames_discarded_total",
        "Total frames discarded because they could not be decoded"
    );
    describe_counter!(
        "market_stream_control_frames_sent_total",
        "Total control frames sent by action"
    );
    describe_counter!(
        "market_stream_connections_total",
        "Total connection attempts by outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connected (and authenticated where required).
    Connected,
    /// Transport failed.
    TransportFailed,
    /// Server rejected the credential.
    AuthFailed,
}

impl ConnectOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::TransportFailed => "transport_failed",
            Self::AuthFailed => "auth_failed",
        }
    }
}

/// Record a frame read from the stream.
pub fn record_frame_received(asset_class: AssetClass) {
    counter!(
        "market_stream_frames_received_total",
        "asset_class" => asset_class.as_str()
    )
    .increment(1);
}

/// Record an event record delivered to the handler.
pub fn record_event_delivered(asset_class: AssetClass, event_type: &str) {
    counter!(
        "market_stream_events_delivered_total",
        "asset_class" => asset_class.as_str(),
        "event_type" => event_type.to_string()
    )
    .increment(1);
}

/// Record a frame that could not be decoded.
pub fn record_frame_discarded(asset_class: AssetClass) {
    counter!(
        "market_stream_frames_discarded_total",
        "asset_class" => asset_class.as_str()
    )
    .increment(1);
}

/// Record a control frame written to the stream.
pub fn record_control_frame(action: &'static str) {
    counter!(
        "market_stream_control_frames_sent_total",
        "action" => action
    )
    .increment(1);
}

/// Record the outcome of a connection attempt.
pub fn record_connect(asset_class: AssetClass, outcome: ConnectOutcome) {
    counter!(
        "market_stream_connections_total",
        "asset_class" => asset_class.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_outcome_as_str() {
        assert_eq!(ConnectOutcome::Connected.as_str(), "connected");
        assert_eq!(ConnectOutcome::TransportFailed.as_str(), "transport_failed");
        assert_eq!(ConnectOutcome::AuthFailed.as_str(), "auth_failed");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received(AssetClass::Stocks);
        record_event_delivered(AssetClass::Crypto, "XT");
        record_frame_discarded(AssetClass::Forex);
        record_control_frame("subscribe");
        record_connect(AssetClass::Options, ConnectOutcome::Connected);
    }
}
