//! Buffered multi-document transaction over a [`MemoryStore`]

use super::{Fault, MemoryStore};
use crate::core::context::RequestContext;
use crate::core::traits::{LedgerSession, StatusUpdate};
use crate::types::{
    Account, Card, CardNumber, CardTransaction, CashTransaction, StoreError, TransactionStatus,
    UserId,
};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Session staging writes against a [`MemoryStore`]
///
/// Nothing staged here is visible to readers until [`LedgerSession::commit`]
/// succeeds. Staging a second update for the same account or card replaces the
/// first.
#[derive(Debug)]
pub struct MemorySession<'a> {
    store: &'a MemoryStore,
    cash: Vec<CashTransaction>,
    cards: Vec<CardTransaction>,
    accounts: BTreeMap<UserId, Account>,
    catalog: BTreeMap<CardNumber, Card>,
    cash_status: Vec<StatusUpdate>,
    card_status: Vec<StatusUpdate>,
}

impl<'a> MemorySession<'a> {
    pub(super) fn new(store: &'a MemoryStore) -> Self {
        MemorySession {
            store,
            cash: Vec::new(),
            cards: Vec::new(),
            accounts: BTreeMap::new(),
            catalog: BTreeMap::new(),
            cash_status: Vec::new(),
            card_status: Vec::new(),
        }
    }

    fn verify_versions(&self) -> Result<(), StoreError> {
        for (user_id, staged) in &self.accounts {
            let current = self.store.accounts.get(user_id).map(|entry| entry.version);
            if current != Some(staged.version) {
                return Err(StoreError::WriteConflict {
                    entity: format!("account {}", user_id),
                });
            }
        }
        for (number, staged) in &self.catalog {
            let current = self.store.catalog.get(number).map(|entry| entry.version);
            if current != Some(staged.version) {
                return Err(StoreError::WriteConflict {
                    entity: format!("card {}", number),
                });
            }
        }
        Ok(())
    }
}

/// Check that every stored record under the update's guid may take its new status
fn verify_transition<R>(
    records: &DashMap<u64, R>,
    update: &StatusUpdate,
    kind: &str,
    view: impl Fn(&R) -> (u64, TransactionStatus),
) -> Result<(), StoreError> {
    for entry in records.iter() {
        let (guid, status) = view(entry.value());
        if guid == update.guid && !status.can_transition_to(update.status) {
            return Err(StoreError::InvalidTransition {
                entity: format!("{} record {}", kind, entry.key()),
                from: status.to_string(),
                to: update.status.to_string(),
            });
        }
    }
    Ok(())
}

impl LedgerSession for MemorySession<'_> {
    fn insert_cash(
        &mut self,
        ctx: &RequestContext,
        record: CashTransaction,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        self.store.trip(Fault::LedgerInsert)?;
        if record.amount <= rust_decimal::Decimal::ZERO {
            return Err(StoreError::Rejected(format!(
                "cash record {} has non-positive amount {}",
                record.id, record.amount
            )));
        }
        if record.given_by == record.given_to {
            return Err(StoreError::Rejected(format!(
                "cash record {} moves cash from {} to itself",
                record.id, record.given_by
            )));
        }
        self.cash.push(record);
        Ok(())
    }

    fn insert_cards(
        &mut self,
        ctx: &RequestContext,
        records: Vec<CardTransaction>,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        self.store.trip(Fault::LedgerInsert)?;
        for record in &records {
            if record.amount == 0 {
                return Err(StoreError::Rejected(format!(
                    "card record {} moves zero units",
                    record.id
                )));
            }
            if record.given_by == record.given_to {
                return Err(StoreError::Rejected(format!(
                    "card record {} moves cards from {} to itself",
                    record.id, record.given_by
                )));
            }
            if !self.store.catalog.contains_key(&record.card_number) {
                return Err(StoreError::Rejected(format!(
                    "card record {} references unknown card {}",
                    record.id, record.card_number
                )));
            }
        }
        self.cards.extend(records);
        Ok(())
    }

    fn update_account(
        &mut self,
        ctx: &RequestContext,
        account: Account,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        self.store.trip(Fault::AccountUpdate)?;
        self.accounts.insert(account.user_id, account);
        Ok(())
    }

    fn update_cards(&mut self, ctx: &RequestContext, cards: Vec<Card>) -> Result<(), StoreError> {
        ctx.check()?;
        self.store.trip(Fault::CardUpdate)?;
        for card in cards {
            self.catalog.insert(card.number.clone(), card);
        }
        Ok(())
    }

    fn update_cash_status(
        &mut self,
        ctx: &RequestContext,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        self.cash_status.push(update);
        Ok(())
    }

    fn update_card_status(
        &mut self,
        ctx: &RequestContext,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        self.card_status.push(update);
        Ok(())
    }

    fn commit(self: Box<Self>, ctx: &RequestContext) -> Result<(), StoreError> {
        ctx.check()?;
        self.store.trip(Fault::Commit)?;

        let store = self.store;
        let _guard = store
            .commit_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("commit lock poisoned".to_string()))?;

        self.verify_versions()?;
        for update in &self.cash_status {
            verify_transition(&store.cash, update, "cash", |record| {
                (record.transaction_guid, record.status)
            })?;
        }
        for update in &self.card_status {
            verify_transition(&store.cards, update, "card", |record| {
                (record.transaction_guid, record.status)
            })?;
        }

        let MemorySession {
            cash,
            cards,
            accounts,
            catalog,
            cash_status,
            card_status,
            ..
        } = *self;

        for (user_id, mut account) in accounts {
            account.version += 1;
            store.accounts.insert(user_id, account);
        }
        for (number, mut card) in catalog {
            card.version += 1;
            store.catalog.insert(number, card);
        }
        for record in cash {
            store.cash.insert(record.id, record);
        }
        for record in cards {
            store.cards.insert(record.id, record);
        }

        let now = Utc::now();
        for update in cash_status {
            for mut entry in store.cash.iter_mut() {
                let record = entry.value_mut();
                if record.transaction_guid == update.guid {
                    record.status = update.status;
                    record.updated_by = Some(update.updated_by);
                    record.updated_at = Some(now);
                }
            }
        }
        for update in card_status {
            for mut entry in store.cards.iter_mut() {
                let record = entry.value_mut();
                if record.transaction_guid == update.guid {
                    record.status = update.status;
                    record.updated_by = Some(update.updated_by);
                    record.updated_at = Some(now);
                }
            }
        }
        Ok(())
    }

    fn abort(self: Box<Self>, _ctx: &RequestContext) -> Result<(), StoreError> {
        self.store.trip(Fault::Abort)
    }
}
