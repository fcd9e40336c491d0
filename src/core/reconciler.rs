//! Per-user transaction history
//!
//! Cash and card legs live in separate ledgers. The reconciler pulls every
//! leg a user sent or received, groups them by GUID and folds each group into
//! one [`ReconciledTransaction`], so an exchange's cash and card legs are
//! always reported together.
//!
//! Time, counterparty and status come from the first leg found, looking in
//! this order: cards received, cards sent, cash sent, cash received.

use crate::core::context::RequestContext;
use crate::core::engine::LedgerEngine;
use crate::core::traits::LedgerStore;
use crate::types::{
    CardAmount, CardTransaction, CashTransaction, LedgerError, Party, ReconciledTransaction,
    TransactionGuid, TransactionStatus, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

type Grouped<R> = BTreeMap<TransactionGuid, Vec<R>>;

/// Time, counterparty and status of a reconciled transaction
type Header = (DateTime<Utc>, Party, TransactionStatus);

impl<S: LedgerStore> LedgerEngine<S> {
    /// Every transaction `user_id` took part in, newest GUID first
    ///
    /// Returns an empty list if the user has no transactions. Reads are not
    /// isolated from concurrent writes.
    ///
    /// # Errors
    ///
    /// `BadRequest` if `user_id` is 0, `SystemError` if a ledger query fails
    pub fn get_transactions(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Vec<ReconciledTransaction>, LedgerError> {
        if user_id == 0 {
            return Err(LedgerError::bad_request("user id is required"));
        }

        let store = self.store();
        let sent_cash = group(store.cash_given_by(ctx, user_id)?, |r| r.transaction_guid);
        let received_cash = group(store.cash_given_to(ctx, user_id)?, |r| r.transaction_guid);
        let sent_cards = group(store.cards_given_by(ctx, user_id)?, |r| r.transaction_guid);
        let received_cards = group(store.cards_given_to(ctx, user_id)?, |r| r.transaction_guid);

        let guids: BTreeSet<TransactionGuid> = sent_cash
            .keys()
            .chain(received_cash.keys())
            .chain(sent_cards.keys())
            .chain(received_cards.keys())
            .copied()
            .collect();

        let mut transactions: Vec<ReconciledTransaction> = Vec::with_capacity(guids.len());
        for guid in guids.into_iter().rev() {
            let cash_sent = legs(&sent_cash, guid);
            let cash_received = legs(&received_cash, guid);
            let cards_sent = legs(&sent_cards, guid);
            let cards_received = legs(&received_cards, guid);

            let Some((time, counterparty, status)) =
                header(cards_received, cards_sent, cash_sent, cash_received)
            else {
                continue;
            };
            transactions.push(ReconciledTransaction {
                transaction_guid: guid,
                cards_sent: sum_cards(cards_sent),
                cards_received: sum_cards(cards_received),
                cash_sent: sum_cash(guid, cash_sent)?,
                cash_received: sum_cash(guid, cash_received)?,
                counterparty,
                time,
                status,
            });
        }

        debug!(
            user = user_id,
            transactions = transactions.len(),
            "Reconciled transaction history"
        );
        Ok(transactions)
    }
}

fn group<R>(records: Vec<R>, guid: impl Fn(&R) -> TransactionGuid) -> Grouped<R> {
    let mut grouped: Grouped<R> = BTreeMap::new();
    for record in records {
        grouped.entry(guid(&record)).or_default().push(record);
    }
    grouped
}

fn legs<R>(grouped: &Grouped<R>, guid: TransactionGuid) -> &[R] {
    grouped.get(&guid).map(Vec::as_slice).unwrap_or(&[])
}

fn header(
    cards_received: &[CardTransaction],
    cards_sent: &[CardTransaction],
    cash_sent: &[CashTransaction],
    cash_received: &[CashTransaction],
) -> Option<Header> {
    cards_received
        .first()
        .map(|r| (r.created_at, r.given_by, r.status))
        .or_else(|| cards_sent.first().map(|r| (r.created_at, r.given_to, r.status)))
        .or_else(|| cash_sent.first().map(|r| (r.created_at, r.given_to, r.status)))
        .or_else(|| cash_received.first().map(|r| (r.created_at, r.given_by, r.status)))
}

/// Total of the cash legs of one transaction
fn sum_cash(guid: TransactionGuid, records: &[CashTransaction]) -> Result<Decimal, LedgerError> {
    records.iter().try_fold(Decimal::ZERO, |total, record| {
        total.checked_add(record.amount).ok_or_else(|| {
            LedgerError::system(format!("cash total of transaction {} overflows", guid))
        })
    })
}

/// Units per card number, in order of first appearance
fn sum_cards(records: &[CardTransaction]) -> Vec<CardAmount> {
    let mut summed: Vec<CardAmount> = Vec::new();
    for record in records {
        match summed
            .iter_mut()
            .find(|card| card.card_number == record.card_number)
        {
            Some(card) => card.amount = card.amount.saturating_add(record.amount),
            None => summed.push(CardAmount::new(record.card_number.clone(), record.amount)),
        }
    }
    summed
}

/// Total cash sent and received across a reconciled history
///
/// # Errors
///
/// `SystemError` if either total overflows
pub fn cash_totals(
    transactions: &[ReconciledTransaction],
) -> Result<(Decimal, Decimal), LedgerError> {
    transactions.iter().try_fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(sent, received), transaction| {
            let sent = sent.checked_add(transaction.cash_sent);
            let received = received.checked_add(transaction.cash_received);
            sent.zip(received)
                .ok_or_else(|| LedgerError::system("history cash totals overflow"))
        },
    )
}
