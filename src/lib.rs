//! Card Ledger Engine Library
//! # Overview
//!
//! This library records and settles movements of cash and collectible cards
//! between players of a card game, and between players and the system (which
//! mints cards out of a fixed catalog and funds cash grants).
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (accounts, cards, ledger records, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::traits`] - Store contracts the engine runs against
//!   - [`core::store`] - Concurrent in-memory store with buffered sessions
//!   - [`core::balance`] - Affordability checks
//!   - [`core::engine`] - The [`LedgerEngine`] and its shared plumbing
//! - [`io`] - CSV seeds, command stream and reports
//! - [`replay`] - The replay pipeline behind the `ledger-engine` binary
//!
//! # Operations
//!
//! - **Transfer cash / cards**: unilateral movement, settled at once when the
//!   payer asks for it, otherwise recorded as pending
//! - **Give cards**: admin-only mint from catalog headroom
//! - **Exchange**: two-sided barter proposal recorded as pending legs
//! - **Execute / decline exchange**: the counterparty settles or fails every leg
//! - **Get transactions**: per-user history, one entry per transaction GUID
//!
//! # Ledger Records
//!
//! Every movement is an immutable cash or card record. Records written by one
//! operation share a transaction GUID; their status moves at most once, from
//! `pending` to `success` or `failed`.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod replay;
pub mod types;

pub use core::{EngineConfig, LedgerEngine, MemoryStore, RequestContext, SettlementPolicy};
pub use io::{write_accounts_csv, write_history_csv};
pub use types::{
    Account, Card, CardAmount, CardTransaction, CashTransaction, LedgerError, Party,
    ReconciledTransaction, StoreError, TransactionGuid, TransactionStatus, UserId,
};
