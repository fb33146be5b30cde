//! Domain Layer - Core streaming types and business logic.
//!
//! Pure types for subscriptions and event records. Nothing here performs
//! I/O.

/// Event records (trades, quotes, aggregates, status).
pub mod streaming;

/// Asset classes, channels and subscription strings.
pub mod subscription;
