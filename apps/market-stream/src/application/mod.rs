//! Application Layer - Use cases and port definitions.
//!
//! Ports the stream adapter calls out through, and the services that
//! consume what it delivers.

/// Port interfaces (event handler, credential source).
pub mod ports;

/// Application services (event rendering).
pub mod services;
