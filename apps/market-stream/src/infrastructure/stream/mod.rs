//! Market Data Stream Adapter
//!
//! WebSocket client for the market data push feed.
//!
//! # Endpoint
//!
//! `<endpoint>/<asset_class>/<channel>`, for example
//! `wss://socket.massive.com/stocks/T`.
//!
//! # Protocol
//!
//! - Control frames are JSON objects: `{"action": ..., "params": ...}`
//! - Data frames are JSON arrays of records discriminated by `ev`
//! - Status records (`"ev":"status"`) report connect, auth and
//!   subscription results

pub mod auth;
pub mod client;
pub mod codec;
pub mod messages;

pub use auth::{AUTH_STYLE_TABLE, AUTH_TIMEOUT, AuthError, AuthStyle, Credential};
pub use client::{CLOSE_TIMEOUT, ConnectionState, ListenOutcome, StreamClient, StreamError};
pub use codec::{CodecError, JsonCodec};
pub use messages::{ControlAction, ControlMessage, StatusKind};
