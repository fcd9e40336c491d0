use super::MemoryStore;
use crate::core::context::RequestContext;
use crate::core::traits::{CardLedger, CashLedger};
use crate::types::{
    CardTransaction, CashTransaction, Party, StoreError, TransactionGuid, UserId,
};
use dashmap::DashMap;

/// Clone every record matching `keep`, ordered by id
fn select<R: Clone>(
    records: &DashMap<u64, R>,
    keep: impl Fn(&R) -> bool,
) -> Vec<R> {
    let mut selected: Vec<(u64, R)> = records
        .iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect();
    selected.sort_by_key(|(id, _)| *id);
    selected.into_iter().map(|(_, record)| record).collect()
}

impl CashLedger for MemoryStore {
    fn cash_given_by(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CashTransaction>, StoreError> {
        ctx.check()?;
        Ok(select(&self.cash, |record| {
            record.given_by == Party::User(user_id)
        }))
    }

    fn cash_given_to(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CashTransaction>, StoreError> {
        ctx.check()?;
        Ok(select(&self.cash, |record| {
            record.given_to == Party::User(user_id)
        }))
    }

    fn cash_by_guid(
        &self,
        ctx: &RequestContext,
        guid: TransactionGuid,
    ) -> Result<Vec<CashTransaction>, StoreError> {
        ctx.check()?;
        Ok(select(&self.cash, |record| record.transaction_guid == guid))
    }
}

impl CardLedger for MemoryStore {
    fn cards_given_by(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CardTransaction>, StoreError> {
        ctx.check()?;
        Ok(select(&self.cards, |record| {
            record.given_by == Party::User(user_id)
        }))
    }

    fn cards_given_to(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<CardTransaction>, StoreError> {
        ctx.check()?;
        Ok(select(&self.cards, |record| {
            record.given_to == Party::User(user_id)
        }))
    }

    fn cards_by_guid(
        &self,
        ctx: &RequestContext,
        guid: TransactionGuid,
    ) -> Result<Vec<CardTransaction>, StoreError> {
        ctx.check()?;
        Ok(select(&self.cards, |record| record.transaction_guid == guid))
    }
}
