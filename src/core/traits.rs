//! Store contracts the engine depends on
//!
//! The account store, card catalog, both ledger stores and the sequence
//! generator are external collaborators. These traits are the seams: the
//! engine is generic over a [`LedgerStore`], and [`crate::core::MemoryStore`]
//! is the in-process implementation.

use crate::core::context::RequestContext;
use crate::types::{
    Account, Card, CardNumber, CardTransaction, CashTransaction, Party, StoreError,
    TransactionGuid, TransactionStatus, UserId,
};

/// Account lookup filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    Id(UserId),
    Ids(Vec<UserId>),
}

/// Card catalog lookup filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFilter {
    Number(CardNumber),
    Numbers(Vec<CardNumber>),
}

/// Read access to player accounts
pub trait AccountStore {
    fn get_accounts(
        &self,
        ctx: &RequestContext,
        filter: &AccountFilter,
    ) -> Result<Vec<Account>, StoreError>;
}

/// Read access to the card catalog
pub trait CardCatalog {
    /// Cards matching the filter; unknown numbers are simply absent
    fn get_cards(&self, ctx: &RequestContext, filter: &CardFilter)
        -> Result<Vec<Card>, StoreError>;
}

/// Queries over persisted cash movements, ordered by record id
pub trait CashLedger {
    fn cash_given_by(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CashTransaction>, StoreError>;

    fn cash_given_to(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CashTransaction>, StoreError>;

    fn cash_by_guid(
        &self,
        ctx: &RequestContext,
        guid: TransactionGuid,
    ) -> Result<Vec<CashTransaction>, StoreError>;
}

/// Queries over persisted card movements, ordered by record id
pub trait CardLedger {
    fn cards_given_by(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CardTransaction>, StoreError>;

    fn cards_given_to(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CardTransaction>, StoreError>;

    fn cards_by_guid(
        &self,
        ctx: &RequestContext,
        guid: TransactionGuid,
    ) -> Result<Vec<CardTransaction>, StoreError>;
}

/// Durable per-name counters
///
/// Every call is one atomic find-and-increment: concurrent callers never
/// observe the same value for the same counter, and `0` is never returned.
pub trait SequenceGenerator {
    fn next_sequence(&self, ctx: &RequestContext, counter: &str) -> Result<u64, StoreError>;
}

/// Bulk status change applied to every record sharing a GUID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub guid: TransactionGuid,
    pub status: TransactionStatus,
    pub updated_by: Party,
}

/// Multi-document transaction scope
///
/// Writes are staged on the session and become visible together on
/// [`LedgerSession::commit`]; [`LedgerSession::abort`] discards all of them.
pub trait LedgerSession {
    fn insert_cash(
        &mut self,
        ctx: &RequestContext,
        record: CashTransaction,
    ) -> Result<(), StoreError>;

    fn insert_cards(
        &mut self,
        ctx: &RequestContext,
        records: Vec<CardTransaction>,
    ) -> Result<(), StoreError>;

    fn update_account(&mut self, ctx: &RequestContext, account: Account)
        -> Result<(), StoreError>;

    fn update_cards(&mut self, ctx: &RequestContext, cards: Vec<Card>) -> Result<(), StoreError>;

    fn update_cash_status(
        &mut self,
        ctx: &RequestContext,
        update: StatusUpdate,
    ) -> Result<(), StoreError>;

    fn update_card_status(
        &mut self,
        ctx: &RequestContext,
        update: StatusUpdate,
    ) -> Result<(), StoreError>;

    /// Apply every staged write
    ///
    /// Must be all-or-nothing: a failed commit leaves the store exactly as it
    /// was, with none of the staged writes visible. The session is consumed
    /// either way, so callers cannot abort after a failed commit.
    fn commit(self: Box<Self>, ctx: &RequestContext) -> Result<(), StoreError>;

    /// Discard every staged write
    fn abort(self: Box<Self>, ctx: &RequestContext) -> Result<(), StoreError>;
}

/// Everything the engine needs from persistence
pub trait LedgerStore:
    AccountStore + CardCatalog + CashLedger + CardLedger + SequenceGenerator
{
    fn start_session(
        &self,
        ctx: &RequestContext,
    ) -> Result<Box<dyn LedgerSession + '_>, StoreError>;
}
