//! Card Ledger Engine CLI
//!
//! Replays ledger commands from a CSV file against seeded accounts and a card
//! catalog.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv --cards cards.csv commands.csv > balances.csv
//! cargo run -- --accounts accounts.csv --cards cards.csv --history 42 commands.csv > history.csv
//! cargo run -- --accounts accounts.csv --settlement-policy downgrade --timeout-ms 500 commands.csv
//! ```
//!
//! Reports go to stdout as CSV. Logs go to stderr; set `RUST_LOG` (e.g.
//! `RUST_LOG=card_ledger_engine=debug`) to see more than warnings.
//!
//! # Exit Codes
//!
//! - 0: Success (individual commands may still have been rejected)
//! - 1: Error (missing arguments, unreadable or invalid seed files, output failure)

use card_ledger_engine::{cli, replay};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = replay::run(&args, &mut output) {
        tracing::error!(error = %e, "Replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
