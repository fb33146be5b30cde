//! Market Data Event Records
//!
//! Typed records decoded from the push feed. Every record carries an `ev`
//! discriminator; the remaining fields depend on the channel.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"ev":"T","sym":"MSFT","x":4,"i":"12345","z":3,"p":420.50,"s":100,"c":[12],"t":1700000000000,"q":9001}
//! {"ev":"XQ","pair":"BTC-USD","bp":33052.79,"bs":0.48,"ap":33073.19,"as":0.6,"t":1700000000000,"x":1,"r":1700000000010}
//! {"ev":"FMV","sym":"AAPL","fmv":189.17,"t":1700000000000000000}
//! ```
//!
//! Timestamps stay raw on the record; their unit depends on the channel
//! (milliseconds, microseconds or nanoseconds). Use [`normalize_timestamp`]
//! to turn one into a `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Timestamp Normalization
// =============================================================================

/// Epoch values at or above this are nanoseconds.
pub const NANOS_THRESHOLD: i64 = 100_000_000_000_000_000;

/// Epoch values at or above this are microseconds.
pub const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

/// Epoch values at or above this are milliseconds; anything below is seconds.
pub const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Convert a raw epoch timestamp of unknown unit into a UTC instant.
///
/// The unit is inferred from the order of magnitude. Returns `None` for
/// values chrono cannot represent.
#[must_use]
pub fn normalize_timestamp(raw: i64) -> Option<DateTime<Utc>> {
    if raw >= NANOS_THRESHOLD {
        Some(DateTime::from_timestamp_nanos(raw))
    } else if raw >= MICROS_THRESHOLD {
        DateTime::from_timestamp_micros(raw)
    } else if raw >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

// =============================================================================
// Equity / Option / Futures Records
// =============================================================================

/// Trade print (`ev = "T"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Ticker symbol
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Exchange ID
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<i32>,

    /// Trade ID
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,

    /// Tape (1 = NYSE, 2 = AMEX, 3 = Nasdaq)
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<i32>,

    /// Trade price
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Trade size
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,

    /// Trade condition codes
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<i32>,

    /// SIP timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Sequence number
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

/// Top-of-book quote (`ev = "Q"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Ticker symbol
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Bid exchange ID
    #[serde(rename = "bx", default, skip_serializing_if = "Option::is_none")]
    pub bid_exchange: Option<i32>,

    /// Bid price
    #[serde(rename = "bp", default, skip_serializing_if = "Option::is_none")]
    pub bid_price: Option<Decimal>,

    /// Bid size
    #[serde(rename = "bs", default, skip_serializing_if = "Option::is_none")]
    pub bid_size: Option<Decimal>,

    /// Ask exchange ID
    #[serde(rename = "ax", default, skip_serializing_if = "Option::is_none")]
    pub ask_exchange: Option<i32>,

    /// Ask price
    #[serde(rename = "ap", default, skip_serializing_if = "Option::is_none")]
    pub ask_price: Option<Decimal>,

    /// Ask size
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub ask_size: Option<Decimal>,

    /// Quote condition
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<i32>,

    /// Quote indicators
    #[serde(rename = "i", default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<i32>,

    /// SIP timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Sequence number
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,

    /// Tape
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<i32>,
}

/// OHLCV aggregate over a minute or a second.
///
/// Shared by `A`/`AM` (stocks, options, indices, futures), `XA`/`XAS`
/// (crypto, keyed by `pair`) and `CA`/`CAS` (forex, keyed by `pair`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Ticker symbol or currency pair
    #[serde(rename = "sym", alias = "pair")]
    pub symbol: String,

    /// Window volume
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Accumulated volume for the day
    #[serde(rename = "av", default, skip_serializing_if = "Option::is_none")]
    pub accumulated_volume: Option<Decimal>,

    /// Official opening price for the day
    #[serde(rename = "op", default, skip_serializing_if = "Option::is_none")]
    pub official_open: Option<Decimal>,

    /// Volume weighted average price of the window
    #[serde(rename = "vw", default, skip_serializing_if = "Option::is_none")]
    pub vwap: Option<Decimal>,

    /// Open price
    #[serde(rename = "o")]
    pub open: Decimal,

    /// High price
    #[serde(rename = "h")]
    pub high: Decimal,

    /// Low price
    #[serde(rename = "l")]
    pub low: Decimal,

    /// Close price
    #[serde(rename = "c")]
    pub close: Decimal,

    /// Volume weighted average price of the day
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub day_vwap: Option<Decimal>,

    /// Average trade size of the window
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub average_size: Option<Decimal>,

    /// Window start
    #[serde(rename = "s")]
    pub start: i64,

    /// Window end
    #[serde(rename = "e")]
    pub end: i64,
}

/// Limit-up/limit-down price band (`ev = "LULD"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitBand {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Ticker symbol
    #[serde(rename = "T")]
    pub symbol: String,

    /// Upper band
    #[serde(rename = "h")]
    pub high_price: Decimal,

    /// Lower band
    #[serde(rename = "l")]
    pub low_price: Decimal,

    /// Indicators
    #[serde(rename = "i", default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<i32>,

    /// Tape
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<i32>,

    /// Timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Sequence number
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

/// Fair market value (`ev = "FMV"`), nanosecond timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairMarketValue {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Ticker symbol or pair
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Fair market value
    pub fmv: Decimal,

    /// Timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,
}

/// Index value (`ev = "V"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexValue {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Index ticker (e.g. `I:SPX`)
    #[serde(rename = "T")]
    pub symbol: String,

    /// Index value
    #[serde(rename = "val")]
    pub value: Decimal,

    /// Timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,
}

// =============================================================================
// Crypto / Forex Records
// =============================================================================

/// Crypto trade (`ev = "XT"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoTrade {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Crypto pair (e.g. `BTC-USD`)
    pub pair: String,

    /// Trade price
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Trade size
    #[serde(rename = "s")]
    pub size: Decimal,

    /// Exchange ID
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<i32>,

    /// Trade ID
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,

    /// Conditions
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<i32>,

    /// Exchange timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Received timestamp
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub received: Option<i64>,
}

/// Crypto quote (`ev = "XQ"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoQuote {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Crypto pair
    pub pair: String,

    /// Bid price
    #[serde(rename = "bp")]
    pub bid_price: Decimal,

    /// Bid size
    #[serde(rename = "bs", default, skip_serializing_if = "Option::is_none")]
    pub bid_size: Option<Decimal>,

    /// Ask price
    #[serde(rename = "ap")]
    pub ask_price: Decimal,

    /// Ask size
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub ask_size: Option<Decimal>,

    /// Exchange ID
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<i32>,

    /// Exchange timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Received timestamp
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub received: Option<i64>,
}

/// Forex quote (`ev = "C"`).
///
/// Note that `p` is the currency pair here, not a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForexQuote {
    /// Event type
    #[serde(rename = "ev")]
    pub event_type: String,

    /// Currency pair (e.g. `USD/CNH`)
    #[serde(rename = "p")]
    pub pair: String,

    /// Exchange ID
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<i32>,

    /// Ask price
    #[serde(rename = "a")]
    pub ask_price: Decimal,

    /// Bid price
    #[serde(rename = "b")]
    pub bid_price: Decimal,

    /// Timestamp
    #[serde(rename = "t")]
    pub timestamp: i64,
}

// =============================================================================
// Status
// =============================================================================

/// Out-of-band status record (`ev = "status"`).
///
/// # Wire Format (JSON)
/// ```json
/// {"ev":"status","status":"connected","message":"Connected Successfully"}
/// {"ev":"status","status":"auth_success","message":"authenticated"}
/// {"ev":"status","status":"success","message":"subscribed to: T.MSFT"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Event type (always "status")
    #[serde(rename = "ev", default = "status_event_type")]
    pub event_type: String,

    /// Status marker
    pub status: String,

    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn status_event_type() -> String {
    "status".to_string()
}

impl StatusMessage {
    /// Message text, or an empty string.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// Event Record
// =============================================================================

/// One decoded record from a data frame.
///
/// Records whose `ev` is unknown, or whose fields do not match the
/// expected shape, are kept as [`MarketEvent::Unknown`] so they still
/// reach the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MarketEvent {
    /// Trade print
    Trade(Trade),
    /// Quote
    Quote(Quote),
    /// Minute or second aggregate
    Aggregate(Aggregate),
    /// Limit-up/limit-down band
    LimitBand(LimitBand),
    /// Fair market value
    FairMarketValue(FairMarketValue),
    /// Index value
    IndexValue(IndexValue),
    /// Crypto trade
    CryptoTrade(CryptoTrade),
    /// Crypto quote
    CryptoQuote(CryptoQuote),
    /// Forex quote
    ForexQuote(ForexQuote),
    /// Status message
    Status(StatusMessage),
    /// Anything else, kept verbatim
    Unknown(serde_json::Value),
}

impl MarketEvent {
    /// The `ev` discriminator of the record.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Trade(e) => &e.event_type,
            Self::Quote(e) => &e.event_type,
            Self::Aggregate(e) => &e.event_type,
            Self::LimitBand(e) => &e.event_type,
            Self::FairMarketValue(e) => &e.event_type,
            Self::IndexValue(e) => &e.event_type,
            Self::CryptoTrade(e) => &e.event_type,
            Self::CryptoQuote(e) => &e.event_type,
            Self::ForexQuote(e) => &e.event_type,
            Self::Status(e) => &e.event_type,
            Self::Unknown(value) => value
                .get("ev")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default(),
        }
    }

    /// Symbol or pair the record refers to.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Trade(e) => Some(&e.symbol),
            Self::Quote(e) => Some(&e.symbol),
            Self::Aggregate(e) => Some(&e.symbol),
            Self::LimitBand(e) => Some(&e.symbol),
            Self::FairMarketValue(e) => Some(&e.symbol),
            Self::IndexValue(e) => Some(&e.symbol),
            Self::CryptoTrade(e) => Some(&e.pair),
            Self::CryptoQuote(e) => Some(&e.pair),
            Self::ForexQuote(e) => Some(&e.pair),
            Self::Status(_) | Self::Unknown(_) => None,
        }
    }

    /// Headline price: trade price, close, value or fair market value.
    #[must_use]
    pub const fn price(&self) -> Option<Decimal> {
        match self {
            Self::Trade(e) => Some(e.price),
            Self::Aggregate(e) => Some(e.close),
            Self::FairMarketValue(e) => Some(e.fmv),
            Self::IndexValue(e) => Some(e.value),
            Self::CryptoTrade(e) => Some(e.price),
            Self::Quote(_)
            | Self::LimitBand(_)
            | Self::CryptoQuote(_)
            | Self::ForexQuote(_)
            | Self::Status(_)
            | Self::Unknown(_) => None,
        }
    }

    /// Raw event timestamp (window start for aggregates).
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Self::Trade(e) => Some(e.timestamp),
            Self::Quote(e) => Some(e.timestamp),
            Self::Aggregate(e) => Some(e.start),
            Self::LimitBand(e) => Some(e.timestamp),
            Self::FairMarketValue(e) => Some(e.timestamp),
            Self::IndexValue(e) => Some(e.timestamp),
            Self::CryptoTrade(e) => Some(e.timestamp),
            Self::CryptoQuote(e) => Some(e.timestamp),
            Self::ForexQuote(e) => Some(e.timestamp),
            Self::Status(_) => None,
            Self::Unknown(value) => value.get("t").and_then(serde_json::Value::as_i64),
        }
    }

    /// Check if this is a status record.
    #[must_use]
    pub const fn is_status(&self) -> bool {
        matches!(self, Self::Status(_))
    }
}
