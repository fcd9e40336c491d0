//! CSV readers for seed files and the command stream
//!
//! Delegates format concerns to the csv_format module.
//!
//! # Error Handling
//!
//! - Seed files (accounts, cards) are all-or-nothing: the first bad row fails
//!   the whole read, since replaying against a partial seed is meaningless.
//! - The command stream is an iterator yielding one `Result` per row, so a
//!   malformed command can be reported and skipped.
//! - Line numbers (counting the header as line 1) are included in messages.

use crate::io::csv_format::{
    convert_csv_account, convert_csv_card, convert_csv_command, Command, CsvAccount, CsvCard,
    CsvCommand,
};
use crate::types::{Account, Card};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

fn open(path: &Path) -> Result<csv::Reader<File>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .buffer_capacity(8 * 1024)
        .from_reader(file))
}

fn read_all<R, T>(path: &Path, convert: impl Fn(R) -> Result<T, String>) -> Result<Vec<T>, String>
where
    R: DeserializeOwned,
{
    let mut reader = open(path)?;
    reader
        .deserialize::<R>()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 2;
            row.map_err(|e| format!("CSV parse error: {}", e))
                .and_then(&convert)
                .map_err(|e| format!("{} line {}: {}", path.display(), line, e))
        })
        .collect()
}

/// Read every account from an accounts seed file
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, String> {
    read_all::<CsvAccount, _>(path, convert_csv_account)
}

/// Read every card from a card catalog seed file
pub fn read_cards(path: &Path) -> Result<Vec<Card>, String> {
    read_all::<CsvCard, _>(path, convert_csv_card)
}

/// Streaming reader over a commands CSV file
///
/// Reads one row at a time; memory use does not grow with the file.
#[derive(Debug)]
pub struct CommandReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl CommandReader {
    /// Open a commands file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(Self {
            reader: open(path)?,
            line_num: 1,
        })
    }
}

impl Iterator for CommandReader {
    type Item = Result<Command, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.reader.deserialize::<CsvCommand>().next()?;
        self.line_num += 1;

        Some(match row {
            Ok(row) => {
                convert_csv_command(row).map_err(|e| format!("Line {}: {}", self.line_num, e))
            }
            Err(e) => Err(format!("Line {}: CSV parse error: {}", self.line_num, e)),
        })
    }
}
