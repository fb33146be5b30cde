//! Event Printer
//!
//! Renders records to a writer, one line each.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::str::FromStr;

use crate::application::ports::EventHandler;
use crate::domain::streaming::{MarketEvent, normalize_timestamp};

/// How records are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Fixed-width columns: time, event type, symbol, details.
    #[default]
    Table,
    /// The record as one JSON line.
    Json,
}

impl OutputMode {
    /// Name used on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output mode: {other} (expected table or json)")),
        }
    }
}

/// Prints each record it receives.
#[derive(Debug)]
pub struct EventPrinter<W: Write> {
    mode: OutputMode,
    out: W,
    printed: u64,
    failed: bool,
}

impl EventPrinter<io::Stdout> {
    /// Printer writing to stdout.
    #[must_use]
    pub fn stdout(mode: OutputMode) -> Self {
        Self::new(mode, io::stdout())
    }
}

impl<W: Write> EventPrinter<W> {
    /// Create a printer over `out`.
    pub const fn new(mode: OutputMode, out: W) -> Self {
        Self {
            mode,
            out,
            printed: 0,
            failed: false,
        }
    }

    /// Output mode.
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Number of records written.
    pub const fn printed(&self) -> u64 {
        self.printed
    }

    /// Consume the printer and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn print(&mut self, event: &MarketEvent) -> io::Result<()> {
        let line = match self.mode {
            OutputMode::Table => format_row(event),
            OutputMode::Json => serde_json::to_string(event)?,
        };
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        self.printed += 1;
        Ok(())
    }
}

impl<W: Write> EventHandler for EventPrinter<W> {
    fn on_event(&mut self, event: MarketEvent) {
        if let Err(e) = self.print(&event)
            && !self.failed
        {
            // Reported once; a closed pipe fails every following write too.
            self.failed = true;
            tracing::warn!(error = %e, "Failed to write event");
        }
    }
}

/// Render a record as a table row.
#[must_use]
pub fn format_row(event: &MarketEvent) -> String {
    let time = event
        .timestamp()
        .and_then(normalize_timestamp)
        .map_or_else(|| "-".to_string(), |dt| dt.format("%H:%M:%S%.3f").to_string());

    let mut row = format!(
        "{time:<12}  {:<6} {:<22} ",
        event.event_type(),
        event.symbol().unwrap_or("-")
    );

    // Writing into a String never fails.
    let _ = match event {
        MarketEvent::Trade(t) => write!(
            row,
            "price={} size={}",
            t.price,
            opt(t.size.as_ref())
        ),
        MarketEvent::Quote(q) => write!(
            row,
            "bid={} x {}  ask={} x {}",
            opt(q.bid_price.as_ref()),
            opt(q.bid_size.as_ref()),
            opt(q.ask_price.as_ref()),
            opt(q.ask_size.as_ref())
        ),
        MarketEvent::Aggregate(a) => write!(
            row,
            "o={} h={} l={} c={} v={}",
            a.open,
            a.high,
            a.low,
            a.close,
            opt(a.volume.as_ref())
        ),
        MarketEvent::LimitBand(l) => {
            write!(row, "low={} high={}", l.low_price, l.high_price)
        }
        MarketEvent::FairMarketValue(f) => write!(row, "fmv={}", f.fmv),
        MarketEvent::IndexValue(v) => write!(row, "value={}", v.value),
        MarketEvent::CryptoTrade(t) => write!(row, "price={} size={}", t.price, t.size),
        MarketEvent::CryptoQuote(q) => write!(
            row,
            "bid={} x {}  ask={} x {}",
            q.bid_price,
            opt(q.bid_size.as_ref()),
            q.ask_price,
            opt(q.ask_size.as_ref())
        ),
        MarketEvent::ForexQuote(q) => write!(row, "bid={} ask={}", q.bid_price, q.ask_price),
        MarketEvent::Status(s) => write!(row, "{}: {}", s.status, s.message()),
        MarketEvent::Unknown(value) => write!(row, "{value}"),
    };

    row.trim_end().to_string()
}

fn opt<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::stream::JsonCodec;

    fn decode_one(json: &str) -> MarketEvent {
        JsonCodec::new().decode(json).unwrap().remove(0)
    }

    #[test]
    fn table_row_for_trade() {
        let event = decode_one(r#"[{"ev":"T","sym":"MSFT","p":420.50,"s":100,"t":1700000000000}]"#);
        let row = format_row(&event);
        assert!(row.starts_with("22:13:20.000"));
        assert!(row.contains("MSFT"));
        assert!(row.contains("price=420.5"));
        assert!(row.contains("size=100"));
    }

    #[test]
    fn table_row_for_status() {
        let event = decode_one(r#"{"ev":"status","status":"success","message":"subscribed to: T.MSFT"}"#);
        let row = format_row(&event);
        assert!(row.starts_with('-'));
        assert!(row.ends_with("success: subscribed to: T.MSFT"));
    }

    #[test]
    fn table_row_for_missing_quote_side() {
        let event = decode_one(r#"[{"ev":"Q","sym":"AAPL","bp":189.1,"bs":2,"t":1700000000000}]"#);
        assert!(format_row(&event).contains("ask=- x -"));
    }

    #[test]
    fn json_mode_writes_one_line_per_record() {
        let mut printer = EventPrinter::new(OutputMode::Json, Vec::new());
        printer.on_event(decode_one(r#"[{"ev":"T","sym":"MSFT","p":420.50,"t":1700000000000}]"#));
        printer.on_event(decode_one(r#"[{"ev":"NOI","T":"AAPL"}]"#));
        assert_eq!(printer.printed(), 2);

        let output = String::from_utf8(printer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["sym"], "MSFT");
        assert_eq!(first["ev"], "T");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, serde_json::json!({"ev": "NOI", "T": "AAPL"}));
    }

    #[test]
    fn output_mode_parsing() {
        assert_eq!("JSON".parse::<OutputMode>().unwrap(), OutputMode::Json);
        assert_eq!("table".parse::<OutputMode>().unwrap(), OutputMode::Table);
        assert!("csv".parse::<OutputMode>().is_err());
    }
}
