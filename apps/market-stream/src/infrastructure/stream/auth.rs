//! Stream Authentication
//!
//! Two authentication styles are in use on the feed, selected per asset
//! class and channel.
//!
//! # Query Credential
//!
//! The credential travels in the connection URL (`?apiKey=...`). Nothing
//! else happens after the transport connects.
//!
//! # Challenge/Accept
//!
//! 1. Connect to `<endpoint>/<asset_class>/<channel>`
//! 2. Receive `[{"ev":"status","status":"connected",...}]`
//! 3. Send `{"action":"auth","params":"<credential>"}`
//! 4. Receive `[{"ev":"status","status":"auth_success",...}]` or a failure
//!    status whose `message` is reported verbatim
//!
//! The server drops connections that do not authenticate promptly, so the
//! whole exchange is bounded by [`AUTH_TIMEOUT`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::messages::{ControlMessage, StatusKind};
use crate::domain::streaming::StatusMessage;
use crate::domain::subscription::{AssetClass, Channel};

// =============================================================================
// Constants
// =============================================================================

/// Maximum time allowed for the challenge/accept exchange.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Credential is empty.
    #[error("credential cannot be empty")]
    EmptyCredential,

    /// Server rejected the credential.
    #[error("{message}")]
    Rejected {
        /// Status marker reported by the server
        status: String,
        /// Server message, verbatim
        message: String,
    },

    /// Handshake did not finish within `AUTH_TIMEOUT`.
    #[error("authentication timed out after {}s", AUTH_TIMEOUT.as_secs())]
    Timeout,

    /// Connection closed before the handshake finished.
    #[error("connection closed during authentication: {0}")]
    ConnectionClosed(String),

    /// Unknown auth style name.
    #[error("unknown auth style: {0} (expected query or challenge)")]
    UnknownStyle(String),
}

// =============================================================================
// Credential
// =============================================================================

/// Opaque API credential.
///
/// `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Create a credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmptyCredential` if the value is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(AuthError::EmptyCredential);
        }
        Ok(Self(value))
    }

    /// The raw credential, for the wire only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// =============================================================================
// Auth Style
// =============================================================================

/// How a connection proves its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStyle {
    /// Credential in the URL query string.
    QueryCredential,
    /// Explicit `auth` control frame after the server says `connected`.
    ChallengeAccept,
}

impl AuthStyle {
    /// Short name used on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QueryCredential => "query",
            Self::ChallengeAccept => "challenge",
        }
    }

    /// Resolve the style for an asset class and channel from
    /// [`AUTH_STYLE_TABLE`].
    ///
    /// A channel-specific row wins over an asset-class row; without any
    /// match the style is `ChallengeAccept`.
    #[must_use]
    pub fn resolve(asset_class: AssetClass, channel: &Channel) -> Self {
        let mut class_default = None;
        for rule in AUTH_STYLE_TABLE {
            if rule.asset_class != asset_class {
                continue;
            }
            match rule.channel {
                Some(code) if code == channel.code() => return rule.style,
                Some(_) => {}
                None => class_default = Some(rule.style),
            }
        }
        class_default.unwrap_or(Self::ChallengeAccept)
    }
}

impl fmt::Display for AuthStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthStyle {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "query" | "query-credential" => Ok(Self::QueryCredential),
            "challenge" | "challenge-accept" => Ok(Self::ChallengeAccept),
            other => Err(AuthError::UnknownStyle(other.to_string())),
        }
    }
}

/// One row of the auth style lookup table.
#[derive(Debug, Clone, Copy)]
pub struct AuthStyleRule {
    /// Asset class the row applies to.
    pub asset_class: AssetClass,
    /// Channel code, or `None` for every channel of the asset class.
    pub channel: Option<&'static str>,
    /// Style to use.
    pub style: AuthStyle,
}

const fn rule(
    asset_class: AssetClass,
    channel: Option<&'static str>,
    style: AuthStyle,
) -> AuthStyleRule {
    AuthStyleRule {
        asset_class,
        channel,
        style,
    }
}

/// Auth style per asset class and channel.
///
/// Fair-market-value feeds and futures take the credential in the URL;
/// every other feed uses the challenge/accept exchange.
pub const AUTH_STYLE_TABLE: &[AuthStyleRule] = &[
    rule(AssetClass::Stocks, None, AuthStyle::ChallengeAccept),
    rule(AssetClass::Stocks, Some("FMV"), AuthStyle::QueryCredential),
    rule(AssetClass::Options, None, AuthStyle::ChallengeAccept),
    rule(AssetClass::Options, Some("FMV"), AuthStyle::QueryCredential),
    rule(AssetClass::Indices, None, AuthStyle::ChallengeAccept),
    rule(AssetClass::Crypto, None, AuthStyle::ChallengeAccept),
    rule(AssetClass::Crypto, Some("FMV"), AuthStyle::QueryCredential),
    rule(AssetClass::Forex, None, AuthStyle::ChallengeAccept),
    rule(AssetClass::Forex, Some("FMV"), AuthStyle::QueryCredential),
    rule(AssetClass::Futures, None, AuthStyle::QueryCredential),
];

// =============================================================================
// Authentication State
// =============================================================================

/// Current state of the challenge/accept exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Waiting for the server's `connected` status.
    #[default]
    Disconnected,

    /// Server said `connected`; auth frame not sent yet.
    Connected,

    /// Auth frame sent, awaiting response.
    Authenticating,

    /// Credential accepted.
    Authenticated,

    /// Credential rejected.
    Failed,
}

impl AuthState {
    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// What the connection should do after a status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProgress {
    /// Send the auth frame now.
    SendAuth,
    /// Keep reading.
    Pending,
    /// Handshake complete.
    Authenticated,
}

// =============================================================================
// Authentication Handler
// =============================================================================

/// Tracks the challenge/accept exchange for one connection.
#[derive(Debug, Default)]
pub struct AuthHandler {
    state: AuthState,
}

impl AuthHandler {
    /// Create a handler in the `Disconnected` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AuthState::Disconnected,
        }
    }

    /// Get the current authentication state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Create the auth frame and move to `Authenticating`.
    #[must_use]
    pub fn create_auth_request(&mut self, credential: &Credential) -> ControlMessage {
        self.state = AuthState::Authenticating;
        ControlMessage::auth(credential.expose())
    }

    /// Process a status record from the server.
    ///
    /// Once the auth frame is out, the next status decides the exchange:
    /// anything other than `auth_success` is a rejection.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` with the server's message if the
    /// status reports a failure before authentication completed, or if the
    /// answer to the auth frame is not `auth_success`.
    pub fn on_status(&mut self, status: &StatusMessage) -> Result<AuthProgress, AuthError> {
        let kind = StatusKind::parse(&status.status);

        match (kind, self.state) {
            (StatusKind::AuthSuccess, AuthState::Authenticating) => {
                self.state = AuthState::Authenticated;
                Ok(AuthProgress::Authenticated)
            }
            (_, AuthState::Authenticating) => Err(self.reject(status)),
            (kind, state) if kind.is_failure() && !state.is_authenticated() => {
                Err(self.reject(status))
            }
            (StatusKind::Connected, AuthState::Disconnected) => {
                self.state = AuthState::Connected;
                Ok(AuthProgress::SendAuth)
            }
            _ => Ok(AuthProgress::Pending),
        }
    }

    fn reject(&mut self, status: &StatusMessage) -> AuthError {
        self.state = AuthState::Failed;
        AuthError::Rejected {
            status: status.status.clone(),
            message: status.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: &str, message: &str) -> StatusMessage {
        StatusMessage {
            event_type: "status".to_string(),
            status: status.to_string(),
            message: Some(message.to_string()),
        }
    }

    #[test]
    fn credential_rejects_blank() {
        assert_eq!(Credential::new("  "), Err(AuthError::EmptyCredential));
    }

    #[test]
    fn credential_debug_redacts() {
        let credential = Credential::new("super_secret").unwrap();
        assert!(!format!("{credential:?}").contains("super_secret"));
        assert!(!format!("{credential}").contains("super_secret"));
        assert_eq!(credential.expose(), "super_secret");
    }

    #[test]
    fn auth_style_parsing() {
        assert_eq!(
            "query".parse::<AuthStyle>().unwrap(),
            AuthStyle::QueryCredential
        );
        assert_eq!(
            "Challenge".parse::<AuthStyle>().unwrap(),
            AuthStyle::ChallengeAccept
        );
        assert!("token".parse::<AuthStyle>().is_err());
    }

    #[test]
    fn resolve_prefers_channel_row() {
        let fmv = AssetClass::Stocks.channel("FMV").unwrap();
        let trades = AssetClass::Stocks.channel("T").unwrap();
        assert_eq!(
            AuthStyle::resolve(AssetClass::Stocks, &fmv),
            AuthStyle::QueryCredential
        );
        assert_eq!(
            AuthStyle::resolve(AssetClass::Stocks, &trades),
            AuthStyle::ChallengeAccept
        );
    }

    #[test]
    fn resolve_uses_class_row() {
        let quotes = AssetClass::Futures.channel("Q").unwrap();
        assert_eq!(
            AuthStyle::resolve(AssetClass::Futures, &quotes),
            AuthStyle::QueryCredential
        );
    }

    #[test]
    fn every_asset_class_has_a_row() {
        for class in AssetClass::ALL {
            assert!(
                AUTH_STYLE_TABLE
                    .iter()
                    .any(|rule| rule.asset_class == class && rule.channel.is_none()),
                "missing auth style row for {class}"
            );
        }
    }

    #[test]
    fn challenge_accept_flow() {
        let credential = Credential::new("key").unwrap();
        let mut handler = AuthHandler::new();
        assert_eq!(handler.state(), AuthState::Disconnected);

        let progress = handler.on_status(&status("connected", "Connected Successfully"));
        assert_eq!(progress, Ok(AuthProgress::SendAuth));
        assert_eq!(handler.state(), AuthState::Connected);

        let msg = handler.create_auth_request(&credential);
        assert_eq!(msg.params, "key");
        assert_eq!(handler.state(), AuthState::Authenticating);

        let progress = handler.on_status(&status("auth_success", "authenticated"));
        assert_eq!(progress, Ok(AuthProgress::Authenticated));
        assert!(handler.is_authenticated());
    }

    #[test]
    fn rejection_carries_server_message() {
        let mut handler = AuthHandler::new();
        let _ = handler.on_status(&status("connected", "Connected Successfully"));

        let err = handler
            .on_status(&status("auth_failed", "authentication failed"))
            .unwrap_err();
        assert_eq!(err.to_string(), "authentication failed");
        assert_eq!(handler.state(), AuthState::Failed);
    }

    #[test]
    fn unrelated_status_is_pending() {
        let mut handler = AuthHandler::new();
        let progress = handler.on_status(&status("success", "subscribed to: T.MSFT"));
        assert_eq!(progress, Ok(AuthProgress::Pending));
    }

    #[test]
    fn any_other_answer_to_auth_is_rejected() {
        let mut handler = AuthHandler::new();
        let credential = Credential::new("key").unwrap();
        let _ = handler.on_status(&status("connected", ""));
        let _ = handler.create_auth_request(&credential);

        let err = handler
            .on_status(&status(
                "max_connections",
                "Maximum number of connections exceeded.",
            ))
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::Rejected {
                status: "max_connections".to_string(),
                message: "Maximum number of connections exceeded.".to_string(),
            }
        );
        assert_eq!(handler.state(), AuthState::Failed);
    }

    #[test]
    fn success_before_auth_frame_is_pending() {
        let mut handler = AuthHandler::new();
        let _ = handler.on_status(&status("connected", ""));

        let progress = handler.on_status(&status("auth_success", "authenticated"));
        assert_eq!(progress, Ok(AuthProgress::Pending));
        assert!(!handler.is_authenticated());
    }
}
