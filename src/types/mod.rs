//! Types module
//!
//! Contains core data structures used throughout the engine:
//! - `account`: accounts, card holdings and catalog cards
//! - `transaction`: ledger records, parties, statuses and identifiers
//! - `request`: request/response shapes of the engine operations
//! - `error`: engine and store error types

pub mod account;
pub mod error;
pub mod request;
pub mod transaction;

pub use account::{Account, Card, CardHolding, Role};
pub use error::{LedgerError, StoreError};
pub use request::{
    ExchangeOverview, ExchangeRequest, HeldCard, ReconciledTransaction, TransferCardsRequest,
    TransferCashRequest,
};
pub use transaction::{
    CardAmount, CardNumber, CardTransaction, CashTransaction, Party, RecordId, TransactionGuid,
    TransactionStatus, UserId,
};
