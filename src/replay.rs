//! Replay pipeline
//!
//! Seeds a [`MemoryStore`] from CSV, streams commands through a
//! [`LedgerEngine`] and writes either final balances or one user's
//! reconciled history.
//!
//! # Design
//!
//! The pipeline focuses on orchestration, delegating:
//! - CSV parsing to `io::reader` (seed readers and `CommandReader`)
//! - Ledger semantics to `LedgerEngine`
//! - CSV output to `io::csv_format`
//!
//! Fatal errors (unreadable files, bad seeds, output failures) abort the
//! replay. A malformed or rejected command is logged and skipped.

use crate::cli::CliArgs;
use crate::core::config::TRANSACTION_GUID_COUNTER;
use crate::core::reconciler::cash_totals;
use crate::core::{LedgerEngine, LedgerStore, MemoryStore};
use crate::io::csv_format::{write_accounts_csv, write_history_csv, Command};
use crate::io::reader::{read_accounts, read_cards, CommandReader};
use crate::types::LedgerError;
use std::io::Write;
use tracing::{debug, info, warn};

/// Outcome counts of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Run one command through the engine under a fresh request context
pub fn apply_command<S: LedgerStore>(
    engine: &LedgerEngine<S>,
    command: Command,
) -> Result<(), LedgerError> {
    let ctx = engine.request_context();
    match command {
        Command::TransferCash(request) => engine.transfer_cash(&ctx, request).map(|_| ()),
        Command::TransferCards(request) => engine.transfer_cards(&ctx, request).map(|_| ()),
        Command::GiveCards {
            actor,
            given_to,
            cards,
        } => engine.give_cards(&ctx, actor, given_to, cards).map(|_| ()),
        Command::Exchange(request) => engine.exchange(&ctx, request).map(|_| ()),
        Command::ExecuteExchange { actor, guid } => engine.execute_exchange(&ctx, actor, guid),
        Command::DeclineExchange { actor, guid } => engine.decline_exchange(&ctx, actor, guid),
    }
}

/// Apply every command in order, logging and counting failures
pub fn replay_commands<S, I>(engine: &LedgerEngine<S>, commands: I) -> ReplaySummary
where
    S: LedgerStore,
    I: IntoIterator<Item = Result<Command, String>>,
{
    let mut summary = ReplaySummary::default();

    for command in commands {
        let command = match command {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Skipping malformed command");
                summary.malformed += 1;
                continue;
            }
        };

        let op = command.op();
        match apply_command(engine, command) {
            Ok(()) => {
                debug!(op, "Command applied");
                summary.applied += 1;
            }
            Err(e) => {
                warn!(op, code = e.status_code(), error = %e, "Command rejected");
                summary.rejected += 1;
            }
        }
    }

    summary
}

/// Build a store from the seed files named on the command line
pub fn seed_store(args: &CliArgs) -> Result<MemoryStore, String> {
    let store = MemoryStore::new();

    let accounts = read_accounts(&args.accounts_file)?;
    let account_count = accounts.len();
    for account in accounts {
        store.put_account(account);
    }

    let mut card_count = 0;
    if let Some(cards_file) = &args.cards_file {
        let cards = read_cards(cards_file)?;
        card_count = cards.len();
        for card in cards {
            store.put_card(card);
        }
    }

    if let Some(seed) = args.guid_seed {
        store.seed_counter(TRANSACTION_GUID_COUNTER, seed);
    }

    info!(
        accounts = account_count,
        cards = card_count,
        "Store seeded"
    );
    Ok(store)
}

/// Run the whole replay described by `args`, writing the report to `output`
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<ReplaySummary, String> {
    let store = seed_store(args)?;
    let engine = LedgerEngine::with_config(store, args.to_engine_config());

    let commands = CommandReader::new(&args.commands_file)?;
    let summary = replay_commands(&engine, commands);
    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "Replay finished"
    );

    match args.history {
        Some(user_id) => {
            let ctx = engine.request_context();
            let history = engine
                .get_transactions(&ctx, user_id)
                .map_err(|e| format!("Failed to reconcile history of user {}: {}", user_id, e))?;
            match cash_totals(&history) {
                Ok((sent, received)) => debug!(user = user_id, %sent, %received, "Cash totals"),
                Err(e) => warn!(user = user_id, error = %e, "Skipping cash totals"),
            }
            write_history_csv(&history, output)?;
        }
        None => write_accounts_csv(&engine.store().all_accounts(), output)?,
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Party, Role, TransactionStatus, TransferCashRequest};
    use rust_decimal::Decimal;

    fn transfer(actor: u32, given_by: Party, given_to: u32, amount: i64) -> Command {
        Command::TransferCash(TransferCashRequest {
            user_id: actor,
            given_by,
            given_to,
            amount: Decimal::from(amount),
            status: TransactionStatus::Success,
        })
    }

    #[test]
    fn test_replay_counts_outcomes_and_continues() {
        let store = MemoryStore::new();
        store.put_account(Account::new(1, Role::Admin));
        store.put_account(Account::new(2, Role::User));
        let engine = LedgerEngine::new(store);

        let summary = replay_commands(
            &engine,
            vec![
                Ok(transfer(1, Party::System, 2, 50)),
                Err("Line 3: Invalid operation: 'refund'".to_string()),
                Ok(transfer(2, Party::User(2), 1, 80)),
                Ok(transfer(2, Party::User(2), 1, 20)),
            ],
        );

        assert_eq!(
            summary,
            ReplaySummary {
                applied: 2,
                rejected: 1,
                malformed: 1,
            }
        );
        assert_eq!(engine.store().account(2).unwrap().cash, Decimal::from(30));
        assert_eq!(engine.store().account(1).unwrap().cash, Decimal::from(20));
    }
}
