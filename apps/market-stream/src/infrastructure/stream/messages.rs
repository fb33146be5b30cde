//! Stream Control Messages
//!
//! Wire format types for frames the client sends, and the status markers
//! the server reports back.
//!
//! # Control Frames (client -> server)
//!
//! ```json
//! {"action":"auth","params":"<credential>"}
//! {"action":"subscribe","params":"T.MSFT,T.AAPL"}
//! {"action":"unsubscribe","params":"T.MSFT,T.AAPL"}
//! ```
//!
//! # Status Frames (server -> client)
//!
//! ```json
//! [{"ev":"status","status":"connected","message":"Connected Successfully"}]
//! [{"ev":"status","status":"auth_success","message":"authenticated"}]
//! [{"ev":"status","status":"auth_failed","message":"authentication failed"}]
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Control Frames
// =============================================================================

/// Action carried by a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Authenticate the connection.
    Auth,
    /// Add subscriptions.
    Subscribe,
    /// Remove subscriptions.
    Unsubscribe,
}

impl ControlAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// A client to server control frame.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Requested action
    pub action: ControlAction,

    /// Action parameters (credential or subscription string)
    pub params: String,
}

impl ControlMessage {
    /// Create an authentication frame.
    #[must_use]
    pub fn auth(credential: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Auth,
            params: credential.into(),
        }
    }

    /// Create a subscribe frame.
    #[must_use]
    pub fn subscribe(params: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Subscribe,
            params: params.into(),
        }
    }

    /// Create an unsubscribe frame.
    #[must_use]
    pub fn unsubscribe(params: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Unsubscribe,
            params: params.into(),
        }
    }
}

// Auth frames carry the credential in `params`.
impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: &str = match self.action {
            ControlAction::Auth => "[REDACTED]",
            ControlAction::Subscribe | ControlAction::Unsubscribe => &self.params,
        };
        f.debug_struct("ControlMessage")
            .field("action", &self.action)
            .field("params", &params)
            .finish()
    }
}

// =============================================================================
// Status Markers
// =============================================================================

/// Classified value of a status record's `status` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusKind {
    /// Transport connected; the server is waiting for `auth`.
    Connected,
    /// Credential accepted.
    AuthSuccess,
    /// Credential rejected.
    AuthFailed,
    /// Authentication took too long.
    AuthTimeout,
    /// A subscribe/unsubscribe was applied.
    Success,
    /// Generic error.
    Error,
    /// Any other marker.
    Other(String),
}

impl StatusKind {
    /// Classify a raw status marker.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "connected" => Self::Connected,
            "auth_success" => Self::AuthSuccess,
            "auth_failed" => Self::AuthFailed,
            "auth_timeout" => Self::AuthTimeout,
            "success" => Self::Success,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if the marker reports a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::AuthFailed | Self::AuthTimeout | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_subscribe() {
        let msg = ControlMessage::subscribe("T.MSFT,T.AAPL");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"action":"subscribe","params":"T.MSFT,T.AAPL"}"#);
    }

    #[test]
    fn serialize_auth() {
        let msg = ControlMessage::auth("secret-key");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"action":"auth","params":"secret-key"}"#);
    }

    #[test]
    fn subscribe_and_unsubscribe_differ_only_in_action() {
        let sub: serde_json::Value =
            serde_json::to_value(ControlMessage::subscribe("Q.AAPL")).unwrap();
        let unsub: serde_json::Value =
            serde_json::to_value(ControlMessage::unsubscribe("Q.AAPL")).unwrap();
        assert_eq!(sub["params"], unsub["params"]);
        assert_eq!(sub["action"], "subscribe");
        assert_eq!(unsub["action"], "unsubscribe");
    }

    #[test]
    fn auth_debug_redacts_credential() {
        let debug = format!("{:?}", ControlMessage::auth("secret-key"));
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn status_kind_parse() {
        assert_eq!(StatusKind::parse("connected"), StatusKind::Connected);
        assert_eq!(StatusKind::parse("auth_success"), StatusKind::AuthSuccess);
        assert!(StatusKind::parse("auth_failed").is_failure());
        assert!(StatusKind::parse("auth_timeout").is_failure());
        assert!(!StatusKind::parse("success").is_failure());
        assert_eq!(
            StatusKind::parse("max_connections"),
            StatusKind::Other("max_connections".to_string())
        );
    }
}
