//! Request and response shapes exposed to callers of the engine

use super::account::Card;
use super::transaction::{CardAmount, Party, TransactionGuid, TransactionStatus, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unilateral cash transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCashRequest {
    /// Authenticated caller
    pub user_id: UserId,
    pub given_by: Party,
    pub given_to: UserId,
    pub amount: Decimal,
    pub status: TransactionStatus,
}

/// Unilateral card transfer (or system mint when `given_by` is the system)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCardsRequest {
    /// Authenticated caller
    pub user_id: UserId,
    pub given_by: Party,
    pub given_to: UserId,
    pub cards: Vec<CardAmount>,
    pub status: TransactionStatus,
}

/// Bilateral barter proposal from `given_by` to `given_to`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub given_by: UserId,
    pub given_to: UserId,
    pub cash_sent: Decimal,
    pub cash_received: Decimal,
    pub cards_sent: Vec<CardAmount>,
    pub cards_received: Vec<CardAmount>,
}

/// One logical transaction as seen by a single user
///
/// Built by folding every cash and card record sharing a GUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTransaction {
    pub transaction_guid: TransactionGuid,
    pub cards_sent: Vec<CardAmount>,
    pub cards_received: Vec<CardAmount>,
    pub cash_sent: Decimal,
    pub cash_received: Decimal,
    pub counterparty: Party,
    pub time: DateTime<Utc>,
    pub status: TransactionStatus,
}

/// A card an account holds, joined with its catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldCard {
    pub card: Card,
    pub units: u32,
}

/// What each side of a prospective exchange could put on the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOverview {
    pub your_cash: Decimal,
    pub trader_cash: Decimal,
    pub your_cards: Vec<HeldCard>,
    pub trader_cards: Vec<HeldCard>,
}
