//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, report serialization)
//! - `reader` - Seed file readers and the streaming command reader

pub mod csv_format;
pub mod reader;

pub use csv_format::{
    convert_csv_command, format_card_list, parse_card_list, write_accounts_csv,
    write_history_csv, Command, CsvCommand,
};
pub use reader::{read_accounts, read_cards, CommandReader};
