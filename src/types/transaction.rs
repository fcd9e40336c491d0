//! Ledger record types for the card ledger engine
//!
//! This module defines the two append-only ledger record shapes (cash and card
//! movements), the parties that can appear on either side of a movement, and the
//! settlement status state machine shared by every record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier
///
/// `0` is reserved for the system and is never a valid account id.
pub type UserId = u32;

/// Ledger record identifier, issued by the sequence generator
pub type RecordId = u64;

/// Correlation key joining the cash leg and card legs of one logical transaction
///
/// Issued by the sequence generator; `0` is never issued.
pub type TransactionGuid = u64;

/// Catalog card number
pub type CardNumber = String;

/// One side of an asset movement
///
/// The system acts as an unlimited cash source and mints cards out of the
/// catalog's unoccupied headroom. On the wire (CSV, JSON) the system is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Party {
    System,
    User(UserId),
}

impl Party {
    /// The user id behind this party, `None` for the system
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Party::System => None,
            Party::User(id) => Some(id),
        }
    }

    pub fn is_system(self) -> bool {
        matches!(self, Party::System)
    }
}

impl From<u32> for Party {
    fn from(raw: u32) -> Self {
        if raw == 0 {
            Party::System
        } else {
            Party::User(raw)
        }
    }
}

impl From<Party> for u32 {
    fn from(party: Party) -> Self {
        party.user_id().unwrap_or(0)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::System => write!(f, "system"),
            Party::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Settlement status of a ledger record
///
/// Records are created `Pending` (or directly `Success` for settled unilateral
/// transfers). The only allowed transition is `Pending -> Success | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Whether a record in this status may move to `next`
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Success)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }

    /// Parse a requested status, treating anything unrecognized as `Pending`
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(TransactionStatus::Pending)
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested number of units of one card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAmount {
    pub card_number: CardNumber,
    pub amount: u32,
}

impl CardAmount {
    pub fn new(card_number: impl Into<CardNumber>, amount: u32) -> Self {
        CardAmount {
            card_number: card_number.into(),
            amount,
        }
    }
}

/// Persisted cash movement between two parties
///
/// Immutable once written except for `status`, `updated_by` and `updated_at`,
/// which change only through a bulk status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub id: RecordId,
    pub transaction_guid: TransactionGuid,
    pub amount: Decimal,
    pub given_by: Party,
    pub given_to: Party,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: Party,
    pub updated_by: Option<Party>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Persisted movement of card units between two parties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardTransaction {
    pub id: RecordId,
    pub transaction_guid: TransactionGuid,
    pub card_number: CardNumber,
    pub amount: u32,
    pub given_by: Party,
    pub given_to: Party,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: Party,
    pub updated_by: Option<Party>,
    pub updated_at: Option<DateTime<Utc>>,
}
