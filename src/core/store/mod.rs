//! Thread-safe in-memory ledger store
//!
//! `MemoryStore` implements every store contract the engine depends on using
//! `DashMap` for fine-grained locking, so many requests can read and stage
//! writes concurrently.
//!
//! # Design
//!
//! - Accounts, catalog cards, cash records, card records and sequence counters
//!   each live in their own `DashMap`.
//! - Sessions ([`MemorySession`]) buffer writes privately. Commit takes a single
//!   commit lock, verifies that every staged account/card still carries the
//!   version it was read at, then applies all writes. A failed step or an abort
//!   leaves the store untouched.
//! - Sequence counters are incremented under the counter entry's shard lock and
//!   are not part of any session: an aborted session burns the ids it drew.
//!
//! # Fault injection
//!
//! Tests arm one-shot [`Fault`]s to make a specific store step fail once, which
//! is how mid-operation failures are simulated.

mod accounts;
mod ledger;
mod sequence;
mod session;

pub use session::MemorySession;

use crate::core::context::RequestContext;
use crate::core::traits::{LedgerSession, LedgerStore};
use crate::types::{
    Account, Card, CardNumber, CardTransaction, CashTransaction, RecordId, StoreError, UserId,
};
use dashmap::{DashMap, DashSet};
use std::fmt;
use std::sync::Mutex;

/// A store step that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Sequence,
    LedgerInsert,
    AccountUpdate,
    CardUpdate,
    Commit,
    Abort,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Fault::Sequence => "sequence",
            Fault::LedgerInsert => "ledger insert",
            Fault::AccountUpdate => "account update",
            Fault::CardUpdate => "card update",
            Fault::Commit => "commit",
            Fault::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// In-memory implementation of [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<UserId, Account>,
    catalog: DashMap<CardNumber, Card>,
    cash: DashMap<RecordId, CashTransaction>,
    cards: DashMap<RecordId, CardTransaction>,
    counters: DashMap<String, u64>,
    faults: DashSet<Fault>,
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub fn put_account(&self, account: Account) {
        self.accounts.insert(account.user_id, account);
    }

    /// Insert or replace a catalog card
    pub fn put_card(&self, card: Card) {
        self.catalog.insert(card.number.clone(), card);
    }

    /// Provision a counter so that the next issued value is `seed + 1`
    pub fn seed_counter(&self, counter: &str, seed: u64) {
        self.counters.insert(counter.to_string(), seed);
    }

    pub fn account(&self, user_id: UserId) -> Option<Account> {
        self.accounts.get(&user_id).map(|entry| entry.value().clone())
    }

    /// All accounts, sorted by user id
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.user_id);
        accounts
    }

    pub fn card(&self, number: &str) -> Option<Card> {
        self.catalog.get(number).map(|entry| entry.value().clone())
    }

    /// Every persisted cash record, sorted by id
    pub fn cash_records(&self) -> Vec<CashTransaction> {
        let mut records: Vec<CashTransaction> =
            self.cash.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Every persisted card record, sorted by id
    pub fn card_records(&self) -> Vec<CardTransaction> {
        let mut records: Vec<CardTransaction> =
            self.cards.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Make the next occurrence of `fault` fail
    pub fn arm_fault(&self, fault: Fault) {
        self.faults.insert(fault);
    }

    fn trip(&self, fault: Fault) -> Result<(), StoreError> {
        if self.faults.remove(&fault).is_some() {
            return Err(StoreError::Injected(fault.to_string()));
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn start_session(
        &self,
        ctx: &RequestContext,
    ) -> Result<Box<dyn LedgerSession + '_>, StoreError> {
        ctx.check()?;
        Ok(Box::new(MemorySession::new(self)))
    }
}
