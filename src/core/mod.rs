//! Core ledger logic
//!
//! This module contains the engine and the contracts it runs against:
//! - `traits` - Store contracts (accounts, catalog, ledgers, sequences, sessions)
//! - `store` - Concurrent in-memory implementation of every store contract
//! - `context` - Request context carrying the caller's deadline
//! - `config` - Engine configuration and sequence counter names
//! - `balance` - Affordability checks for cash and cards
//! - `engine` - [`LedgerEngine`] and the plumbing its operations share
//! - `transfer` - Unilateral cash/card transfers and system mints
//! - `exchange` - Bilateral exchange proposals
//! - `settlement` - Confirming and declining pending exchanges
//! - `reconciler` - Per-user transaction history

pub mod balance;
pub mod config;
pub mod context;
pub mod engine;
pub mod exchange;
pub mod reconciler;
pub mod settlement;
pub mod store;
pub mod traits;
pub mod transfer;

pub use config::{EngineConfig, SettlementPolicy};
pub use context::RequestContext;
pub use engine::LedgerEngine;
pub use store::{Fault, MemoryStore};
pub use traits::{
    AccountFilter, AccountStore, CardCatalog, CardFilter, CardLedger, CashLedger, LedgerSession,
    LedgerStore, SequenceGenerator, StatusUpdate,
};
