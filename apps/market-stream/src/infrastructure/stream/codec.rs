//! Stream Codec
//!
//! Decodes text frames into event records and encodes control frames.
//!
//! Data frames are JSON arrays of records. Out-of-band status messages may
//! arrive as a bare object, which is treated as a one-element array.
//! Anything else is a decode error; the listener discards such frames and
//! keeps reading.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::streaming::{
    Aggregate, CryptoQuote, CryptoTrade, FairMarketValue, ForexQuote, IndexValue, LimitBand,
    MarketEvent, Quote, StatusMessage, Trade,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but neither an array nor an object.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the market data stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into event records, in array order.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame parses neither as a JSON array nor as
    /// a JSON object.
    pub fn decode(&self, text: &str) -> Result<Vec<MarketEvent>, CodecError> {
        let values = match serde_json::from_str::<Vec<Value>>(text) {
            Ok(values) => values,
            Err(array_err) => match serde_json::from_str::<Value>(text) {
                Ok(object @ Value::Object(_)) => vec![object],
                Ok(other) => {
                    return Err(CodecError::InvalidFormat(format!(
                        "expected JSON array or object, got: {}",
                        truncate(&other.to_string(), 50)
                    )));
                }
                Err(_) => return Err(array_err.into()),
            },
        };

        Ok(values.into_iter().map(decode_record).collect())
    }

    /// Encode a value to JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Decode one record by its `ev` discriminator.
///
/// Records that do not match their expected shape are kept as
/// `MarketEvent::Unknown`.
fn decode_record(value: Value) -> MarketEvent {
    let event_type = value.get("ev").and_then(Value::as_str);

    let decoded = match event_type {
        Some("T") => Trade::deserialize(&value).map(MarketEvent::Trade),
        Some("Q") => Quote::deserialize(&value).map(MarketEvent::Quote),
        Some("A" | "AM" | "XA" | "XAS" | "CA" | "CAS") => {
            Aggregate::deserialize(&value).map(MarketEvent::Aggregate)
        }
        Some("LULD") => LimitBand::deserialize(&value).map(MarketEvent::LimitBand),
        Some("FMV") => FairMarketValue::deserialize(&value).map(MarketEvent::FairMarketValue),
        Some("V") => IndexValue::deserialize(&value).map(MarketEvent::IndexValue),
        Some("XT") => CryptoTrade::deserialize(&value).map(MarketEvent::CryptoTrade),
        Some("XQ") => CryptoQuote::deserialize(&value).map(MarketEvent::CryptoQuote),
        Some("C") => ForexQuote::deserialize(&value).map(MarketEvent::ForexQuote),
        Some("status") => StatusMessage::deserialize(&value).map(MarketEvent::Status),
        None if value.get("status").is_some() => {
            StatusMessage::deserialize(&value).map(MarketEvent::Status)
        }
        _ => return MarketEvent::Unknown(value),
    };

    match decoded {
        Ok(event) => event,
        Err(e) => {
            tracing::trace!(error = %e, "Record did not match its event type");
            MarketEvent::Unknown(value)
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn decode_trade_array() {
        let codec = JsonCodec::new();
        let events = codec
            .decode(r#"[{"ev":"T","sym":"MSFT","p":420.50,"t":1700000000000}]"#)
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol(), Some("MSFT"));
        assert_eq!(events[0].price(), Some(Decimal::new(42050, 2)));
    }

    #[test]
    fn decode_keeps_array_order() {
        let codec = JsonCodec::new();
        let json = r#"[
            {"ev":"Q","sym":"AAPL","bp":189.1,"ap":189.2,"t":1700000000000},
            {"ev":"T","sym":"AAPL","p":189.15,"s":10,"t":1700000000001},
            {"ev":"AM","sym":"AAPL","o":189,"h":190,"l":188,"c":189.5,"v":1000,"s":1700000000000,"e":1700000060000}
        ]"#;

        let events = codec.decode(json).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], MarketEvent::Quote(_)));
        assert!(matches!(&events[1], MarketEvent::Trade(_)));
        assert!(matches!(&events[2], MarketEvent::Aggregate(_)));
    }

    #[test]
    fn decode_single_object_as_one_element() {
        let codec = JsonCodec::new();
        let events = codec
            .decode(r#"{"ev":"status","status":"connected","message":"Connected Successfully"}"#)
            .unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            MarketEvent::Status(status) => assert_eq!(status.status, "connected"),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn decode_status_without_ev() {
        let codec = JsonCodec::new();
        let events = codec
            .decode(r#"[{"status":"auth_failed","message":"bad key"}]"#)
            .unwrap();
        assert!(events[0].is_status());
    }

    #[test]
    fn decode_empty_array() {
        let codec = JsonCodec::new();
        assert!(codec.decode("[]").unwrap().is_empty());
    }

    #[test]
    fn decode_unknown_event_type() {
        let codec = JsonCodec::new();
        let events = codec.decode(r#"[{"ev":"NOI","T":"AAPL"}]"#).unwrap();
        assert!(matches!(&events[0], MarketEvent::Unknown(_)));
        assert_eq!(events[0].event_type(), "NOI");
    }

    #[test]
    fn decode_mismatched_record_is_unknown() {
        let codec = JsonCodec::new();
        let events = codec.decode(r#"[{"ev":"T","sym":"MSFT"}]"#).unwrap();
        assert!(matches!(&events[0], MarketEvent::Unknown(_)));
    }

    #[test]
    fn decode_garbage_fails() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode("not json at all"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn decode_scalar_fails() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode("42"),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
