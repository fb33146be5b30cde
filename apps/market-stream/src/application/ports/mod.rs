//! Port Interfaces
//!
//! Contracts between the stream adapter and the code that drives it,
//! following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `EventHandler`: receives every decoded record from the listener
//!
//! ## Driver Ports (Inbound)
//!
//! - `CredentialSource`: supplies the API credential at startup

use crate::domain::streaming::MarketEvent;
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::stream::Credential;

/// Callback invoked by the listener loop once per record, in arrival order.
///
/// Dispatch is synchronous: the next record is not read until `on_event`
/// returns.
pub trait EventHandler {
    /// Handle one record.
    fn on_event(&mut self, event: MarketEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(MarketEvent),
{
    fn on_event(&mut self, event: MarketEvent) {
        self(event);
    }
}

/// Source of the API credential.
pub trait CredentialSource {
    /// Resolve the credential.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredential` if no source has a value.
    fn credential(&self) -> Result<Credential, ConfigError>;
}
