//! Subscription Types
//!
//! Domain types describing what a stream connection subscribes to:
//! the asset class (URL path segment), the channel (kind of event
//! stream), and the symbol selection.
//!
//! # Wire Format
//!
//! Subscriptions are sent as a comma-joined list of `channel.SYMBOL`
//! tokens, or `channel.*` for every symbol on the channel:
//!
//! ```text
//! T.MSFT,T.AAPL
//! AM.*
//! ```

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while describing a subscription.
///
/// All of these are detected before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// No symbols were supplied and the wildcard was not requested.
    #[error("invalid subscription: supply at least one symbol or request the wildcard")]
    Empty,

    /// The wildcard was combined with explicit symbols.
    #[error("invalid subscription: `*` cannot be combined with other symbols")]
    MixedWildcard,

    /// Asset class name is not one of the known market domains.
    #[error("unknown asset class: {0}")]
    UnknownAssetClass(String),

    /// Channel code is not offered for the asset class.
    #[error("channel {channel} is not available for {asset_class}")]
    UnsupportedChannel {
        /// Asset class the channel was requested for.
        asset_class: AssetClass,
        /// Requested channel code.
        channel: String,
    },
}

// =============================================================================
// Asset Class
// =============================================================================

/// Market domain served by the stream; selects the URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    /// US equities.
    Stocks,
    /// US equity options.
    Options,
    /// Market indices.
    Indices,
    /// Crypto pairs.
    Crypto,
    /// Currency pairs.
    Forex,
    /// Futures contracts.
    Futures,
}

impl AssetClass {
    /// Every asset class, in display order.
    pub const ALL: [Self; 6] = [
        Self::Stocks,
        Self::Options,
        Self::Indices,
        Self::Crypto,
        Self::Forex,
        Self::Futures,
    ];

    /// Path segment used in the connection URL.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Options => "options",
            Self::Indices => "indices",
            Self::Crypto => "crypto",
            Self::Forex => "forex",
            Self::Futures => "futures",
        }
    }

    /// Channels offered for this asset class.
    #[must_use]
    pub const fn channels(&self) -> &'static [ChannelInfo] {
        match self {
            Self::Stocks => STOCK_CHANNELS,
            Self::Options => OPTION_CHANNELS,
            Self::Indices => INDEX_CHANNELS,
            Self::Crypto => CRYPTO_CHANNELS,
            Self::Forex => FOREX_CHANNELS,
            Self::Futures => FUTURES_CHANNELS,
        }
    }

    /// Look up a channel code (case-insensitive) for this asset class.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::UnsupportedChannel` if the asset class
    /// does not offer the channel.
    pub fn channel(&self, code: &str) -> Result<Channel, SubscriptionError> {
        let wanted = code.trim();
        self.channels()
            .iter()
            .find(|info| info.code.eq_ignore_ascii_case(wanted))
            .map(|info| Channel { code: info.code })
            .ok_or_else(|| SubscriptionError::UnsupportedChannel {
                asset_class: *self,
                channel: wanted.to_string(),
            })
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SubscriptionError::UnknownAssetClass(wanted.to_string()))
    }
}

// =============================================================================
// Channel Catalogue
// =============================================================================

/// A channel offered by an asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Wire code, e.g. `T` or `AM`.
    pub code: &'static str,
    /// Human readable description.
    pub description: &'static str,
}

const fn info(code: &'static str, description: &'static str) -> ChannelInfo {
    ChannelInfo { code, description }
}

const STOCK_CHANNELS: &[ChannelInfo] = &[
    info("T", "trades"),
    info("Q", "quotes"),
    info("AM", "per-minute aggregates"),
    info("A", "per-second aggregates"),
    info("LULD", "limit-up/limit-down bands"),
    info("FMV", "fair market value"),
];

const OPTION_CHANNELS: &[ChannelInfo] = &[
    info("T", "trades"),
    info("Q", "quotes"),
    info("AM", "per-minute aggregates"),
    info("A", "per-second aggregates"),
    info("FMV", "fair market value"),
];

const INDEX_CHANNELS: &[ChannelInfo] = &[
    info("V", "index value"),
    info("AM", "per-minute aggregates"),
    info("A", "per-second aggregates"),
];

const CRYPTO_CHANNELS: &[ChannelInfo] = &[
    info("XT", "trades"),
    info("XQ", "quotes"),
    info("XA", "per-minute aggregates"),
    info("XAS", "per-second aggregates"),
    info("FMV", "fair market value"),
];

const FOREX_CHANNELS: &[ChannelInfo] = &[
    info("C", "quotes"),
    info("CA", "per-minute aggregates"),
    info("CAS", "per-second aggregates"),
    info("FMV", "fair market value"),
];

const FUTURES_CHANNELS: &[ChannelInfo] = &[
    info("T", "trades"),
    info("Q", "quotes"),
    info("AM", "per-minute aggregates"),
    info("A", "per-second aggregates"),
];

/// A channel code validated against an asset class.
///
/// Only constructed through [`AssetClass::channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    code: &'static str,
}

impl Channel {
    /// Wire code of the channel.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

// =============================================================================
// Symbol Selection
// =============================================================================

/// Marker accepted on the command line for "all symbols".
pub const WILDCARD: &str = "*";

/// Which symbols a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSelection {
    /// Explicit symbols, in the order given.
    Symbols(Vec<String>),
    /// Every symbol on the channel.
    Wildcard,
}

impl SymbolSelection {
    /// Parse command line arguments into a selection.
    ///
    /// Arguments may themselves be comma separated. A lone `*` selects
    /// the wildcard.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::Empty` if no symbol remains after parsing,
    /// or `SubscriptionError::MixedWildcard` if `*` appears next to symbols.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, SubscriptionError> {
        let mut symbols = Vec::new();
        let mut wildcard = false;
        for arg in args {
            for part in arg.as_ref().split(',') {
                let part = part.trim();
                if part == WILDCARD {
                    wildcard = true;
                } else if !part.is_empty() {
                    symbols.push(part.to_string());
                }
            }
        }

        match (wildcard, symbols.is_empty()) {
            (true, true) => Ok(Self::Wildcard),
            (true, false) => Err(SubscriptionError::MixedWildcard),
            (false, true) => Err(SubscriptionError::Empty),
            (false, false) => Ok(Self::Symbols(symbols)),
        }
    }

    /// Check if this selection is the wildcard.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// Build the wire-format subscription string for a channel.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::Empty` for an empty explicit list.
    pub fn to_params(&self, channel: &Channel) -> Result<String, SubscriptionError> {
        match self {
            Self::Symbols(symbols) => build_params(channel.code(), symbols.as_slice(), false),
            Self::Wildcard => build_params::<&str>(channel.code(), &[], true),
        }
    }
}

/// Build the subscription string sent in subscribe/unsubscribe frames.
///
/// With `wildcard` set the result is `"<channel>.*"` and `symbols` is
/// ignored. Otherwise every symbol is upper-cased, prefixed with
/// `"<channel>."` and the tokens are joined with `,` in input order.
///
/// # Errors
///
/// Returns `SubscriptionError::Empty` if `symbols` is empty or holds a
/// blank entry and `wildcard` is false.
pub fn build_params<S: AsRef<str>>(
    channel: &str,
    symbols: &[S],
    wildcard: bool,
) -> Result<String, SubscriptionError> {
    if wildcard {
        return Ok(format!("{channel}.{WILDCARD}"));
    }
    if symbols.is_empty() || symbols.iter().any(|s| s.as_ref().trim().is_empty()) {
        return Err(SubscriptionError::Empty);
    }

    let params = symbols
        .iter()
        .map(|symbol| format!("{channel}.{}", symbol.as_ref().trim().to_uppercase()))
        .collect::<Vec<_>>()
        .join(",");
    Ok(params)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test]
    fn build_params_joins_in_order() {
        let params = build_params("T", &["MSFT", "AAPL"], false).unwrap();
        assert_eq!(params, "T.MSFT,T.AAPL");
    }

    #[test]
    fn build_params_uppercases_symbols() {
        let params = build_params("Q", &["msft", "x:btcusd"], false).unwrap();
        assert_eq!(params, "Q.MSFT,Q.X:BTCUSD");
    }

    #[test]
    fn build_params_wildcard_ignores_symbols() {
        assert_eq!(build_params("AM", &["AAPL"], true).unwrap(), "AM.*");
        assert_eq!(build_params::<&str>("AM", &[], true).unwrap(), "AM.*");
    }

    #[test]
    fn build_params_empty_fails() {
        let result = build_params::<&str>("T", &[], false);
        assert_eq!(result, Err(SubscriptionError::Empty));
    }

    #[test_case("stocks", AssetClass::Stocks)]
    #[test_case("OPTIONS", AssetClass::Options)]
    #[test_case("Indices", AssetClass::Indices)]
    #[test_case("crypto", AssetClass::Crypto)]
    #[test_case("forex", AssetClass::Forex)]
    #[test_case(" futures ", AssetClass::Futures)]
    fn asset_class_parsing(input: &str, expected: AssetClass) {
        assert_eq!(input.parse::<AssetClass>().unwrap(), expected);
    }

    #[test]
    fn unknown_asset_class_fails() {
        let err = "bonds".parse::<AssetClass>().unwrap_err();
        assert_eq!(err, SubscriptionError::UnknownAssetClass("bonds".to_string()));
    }

    #[test_case(AssetClass::Stocks, "T")]
    #[test_case(AssetClass::Stocks, "luld")]
    #[test_case(AssetClass::Options, "Q")]
    #[test_case(AssetClass::Indices, "V")]
    #[test_case(AssetClass::Crypto, "XAS")]
    #[test_case(AssetClass::Forex, "C")]
    #[test_case(AssetClass::Futures, "AM")]
    fn supported_channels(asset_class: AssetClass, code: &str) {
        let channel = asset_class.channel(code).unwrap();
        assert!(channel.code().eq_ignore_ascii_case(code));
    }

    #[test_case(AssetClass::Indices, "T")]
    #[test_case(AssetClass::Forex, "LULD")]
    #[test_case(AssetClass::Crypto, "Q")]
    #[test_case(AssetClass::Futures, "FMV")]
    fn unsupported_channels(asset_class: AssetClass, code: &str) {
        let err = asset_class.channel(code).unwrap_err();
        assert!(matches!(err, SubscriptionError::UnsupportedChannel { .. }));
    }

    #[test]
    fn selection_parse_splits_commas() {
        let selection = SymbolSelection::parse(&["AAPL,msft", " TSLA "]).unwrap();
        assert_eq!(
            selection,
            SymbolSelection::Symbols(vec![
                "AAPL".to_string(),
                "msft".to_string(),
                "TSLA".to_string()
            ])
        );
    }

    #[test]
    fn selection_parse_wildcard() {
        assert!(SymbolSelection::parse(&["*"]).unwrap().is_wildcard());
        assert!(SymbolSelection::parse(&[" * "]).unwrap().is_wildcard());
    }

    #[test_case(&["AAPL", "*"] ; "trailing wildcard")]
    #[test_case(&["*,MSFT"] ; "wildcard in comma list")]
    #[test_case(&["*", "TSLA", "*"] ; "wildcard around symbol")]
    fn selection_parse_rejects_mixed_wildcard(args: &[&str]) {
        assert_eq!(
            SymbolSelection::parse(args),
            Err(SubscriptionError::MixedWildcard)
        );
    }

    #[test]
    fn build_params_rejects_blank_symbols() {
        assert_eq!(
            build_params("T", &["MSFT", ""], false),
            Err(SubscriptionError::Empty)
        );
        assert_eq!(
            build_params("T", &["  "], false),
            Err(SubscriptionError::Empty)
        );
    }

    #[test]
    fn selection_parse_empty_fails() {
        assert_eq!(
            SymbolSelection::parse::<&str>(&[]),
            Err(SubscriptionError::Empty)
        );
        assert_eq!(
            SymbolSelection::parse(&[" , "]),
            Err(SubscriptionError::Empty)
        );
    }

    #[test]
    fn selection_to_params() {
        let channel = AssetClass::Stocks.channel("T").unwrap();
        let selection = SymbolSelection::Symbols(vec!["msft".to_string(), "aapl".to_string()]);
        assert_eq!(selection.to_params(&channel).unwrap(), "T.MSFT,T.AAPL");
        assert_eq!(
            SymbolSelection::Wildcard.to_params(&channel).unwrap(),
            "T.*"
        );
    }

    proptest! {
        #[test]
        fn built_parts_match_symbols(
            channel in "[A-Z]{1,4}",
            symbols in prop::collection::vec("[A-Za-z]{1,5}", 1..8),
        ) {
            let params = build_params(&channel, symbols.as_slice(), false).unwrap();
            let parts: Vec<&str> = params.split(',').collect();
            let expected: Vec<String> = symbols
                .iter()
                .map(|s| format!("{channel}.{}", s.to_uppercase()))
                .collect();
            prop_assert_eq!(parts, expected);
        }

        #[test]
        fn wildcard_is_constant(
            channel in "[A-Z]{1,4}",
            symbols in prop::collection::vec("[A-Za-z,.*]{0,6}", 0..5),
        ) {
            let params = build_params(&channel, symbols.as_slice(), true).unwrap();
            prop_assert_eq!(params, format!("{channel}.*"));
        }
    }
}
