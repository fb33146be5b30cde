//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations behind the application ports.

/// Market data WebSocket client.
pub mod stream;

/// Stream configuration and credential lookup.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
