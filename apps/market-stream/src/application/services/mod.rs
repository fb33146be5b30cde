//! Application Services
//!
//! - `EventPrinter`: renders records as table rows or JSON lines

mod printer;

pub use printer::{EventPrinter, OutputMode, format_row};
