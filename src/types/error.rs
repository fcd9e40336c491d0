//! Error types for the card ledger engine
//!
//! Two layers are distinguished:
//!
//! - [`StoreError`]: failures reported by the account store, card catalog,
//!   ledger stores and sequence generator.
//! - [`LedgerError`]: the tagged error every engine operation returns. Store
//!   failures surface as [`LedgerError::SystemError`].
//!
//! All validation failures are detected before anything is written.

use super::transaction::Party;
use rust_decimal::Decimal;
use thiserror::Error;

/// Error returned by every engine operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Malformed or self-contradictory input
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// A referenced account, card or transaction does not exist
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Affordability check failed
    ///
    /// `asset` is `"cash"` or the offending card number.
    #[error("Insufficient balance for {holder}: {asset} available {available}, requested {requested}")]
    InsufficientBalance {
        holder: Party,
        asset: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Caller is not allowed to perform the operation
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Sequence, store, commit or abort failure
    #[error("System error: {message}")]
    SystemError { message: String },
}

impl LedgerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        LedgerError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        LedgerError::NotFound {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        LedgerError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        LedgerError::SystemError {
            message: message.into(),
        }
    }

    /// Create an InsufficientBalance error for a cash shortfall
    pub fn insufficient_cash(holder: Party, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientBalance {
            holder,
            asset: "cash".to_string(),
            available,
            requested,
        }
    }

    /// Create an InsufficientBalance error naming the offending card
    pub fn insufficient_cards(
        holder: Party,
        card_number: &str,
        available: u32,
        requested: u32,
    ) -> Self {
        LedgerError::InsufficientBalance {
            holder,
            asset: card_number.to_string(),
            available: Decimal::from(available),
            requested: Decimal::from(requested),
        }
    }

    /// HTTP-style status code for the outer request layer
    pub fn status_code(&self) -> u16 {
        match self {
            LedgerError::BadRequest { .. } | LedgerError::InsufficientBalance { .. } => 400,
            LedgerError::Unauthorized { .. } => 401,
            LedgerError::NotFound { .. } => 404,
            LedgerError::SystemError { .. } => 500,
        }
    }
}

/// Error reported by a store collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// A staged update was based on a version that has since changed
    #[error("write conflict on {entity}")]
    WriteConflict { entity: String },

    #[error("sequence counter '{counter}' is exhausted")]
    CounterExhausted { counter: String },

    /// The store refused a record that breaks a ledger invariant
    #[error("record rejected: {0}")]
    Rejected(String),

    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// Fault armed by a test harness
    #[error("injected fault: {0}")]
    Injected(String),
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        LedgerError::system(error.to_string())
    }
}
