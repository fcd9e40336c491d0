//! Ledger engine
//!
//! This module provides the [`LedgerEngine`] that orchestrates every asset
//! movement by coordinating the account store, card catalog, ledger stores and
//! sequence generator behind a [`LedgerStore`].
//!
//! The operations themselves are split by concern:
//! - `transfer` - unilateral cash/card transfers and system mints
//! - `exchange` - bilateral barter proposals
//! - `settlement` - confirming or declining pending exchanges
//! - `reconciler` - per-user transaction history
//!
//! This module holds what they share: account/card resolution, id issuance,
//! record drafting and the session scope that commits or aborts a write set.

use crate::core::config::{
    EngineConfig, CARD_TRANSACTION_COUNTER, CASH_TRANSACTION_COUNTER, TRANSACTION_GUID_COUNTER,
};
use crate::core::context::RequestContext;
use crate::core::traits::{AccountFilter, CardFilter, LedgerSession, LedgerStore};
use crate::types::{
    Account, Card, CardAmount, CardNumber, CardTransaction, CashTransaction, LedgerError, Party,
    TransactionGuid, TransactionStatus, UserId,
};
use chrono::Utc;
use rust_decimal::Decimal;

/// Orchestrates transfers, exchanges and reconciliation over a store
#[derive(Debug)]
pub struct LedgerEngine<S> {
    store: S,
    config: EngineConfig,
}

/// One cash movement to be recorded
#[derive(Debug, Clone, Copy)]
pub(crate) struct CashLeg {
    pub amount: Decimal,
    pub given_by: Party,
    pub given_to: Party,
}

/// One card movement to be recorded
#[derive(Debug, Clone)]
pub(crate) struct CardLeg {
    pub card: CardAmount,
    pub given_by: Party,
    pub given_to: Party,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Create an engine with the default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        LedgerEngine { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fresh context bounded by the configured request timeout
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.config.request_timeout)
    }

    /// Resolve one account, failing with `NotFound` naming its `role`
    pub(crate) fn load_user(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        role: &str,
    ) -> Result<Account, LedgerError> {
        if user_id == 0 {
            return Err(LedgerError::bad_request(format!("{} id is required", role)));
        }
        self.store
            .get_accounts(ctx, &AccountFilter::Id(user_id))?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found(format!("{} {} not found", role, user_id)))
    }

    /// Resolve catalog cards, failing with `NotFound` if any number is unknown
    pub(crate) fn load_cards(
        &self,
        ctx: &RequestContext,
        numbers: Vec<CardNumber>,
    ) -> Result<Vec<Card>, LedgerError> {
        let cards = self
            .store
            .get_cards(ctx, &CardFilter::Numbers(numbers.clone()))?;
        let missing: Vec<&str> = numbers
            .iter()
            .filter(|number| !cards.iter().any(|card| &card.number == *number))
            .map(String::as_str)
            .collect();
        if cards.is_empty() || !missing.is_empty() {
            return Err(LedgerError::not_found(format!(
                "cards not found: {}",
                missing.join(", ")
            )));
        }
        Ok(cards)
    }

    pub(crate) fn next_guid(&self, ctx: &RequestContext) -> Result<TransactionGuid, LedgerError> {
        self.store
            .next_sequence(ctx, TRANSACTION_GUID_COUNTER)
            .map_err(|e| LedgerError::system(format!("failed to issue transaction guid: {}", e)))
    }

    pub(crate) fn cash_record(
        &self,
        ctx: &RequestContext,
        guid: TransactionGuid,
        leg: CashLeg,
        status: TransactionStatus,
        created_by: Party,
    ) -> Result<CashTransaction, LedgerError> {
        let id = self
            .store
            .next_sequence(ctx, CASH_TRANSACTION_COUNTER)
            .map_err(|e| LedgerError::system(format!("failed to issue cash record id: {}", e)))?;
        Ok(CashTransaction {
            id,
            transaction_guid: guid,
            amount: leg.amount,
            given_by: leg.given_by,
            given_to: leg.given_to,
            status,
            created_at: Utc::now(),
            created_by,
            updated_by: None,
            updated_at: None,
        })
    }

    pub(crate) fn card_records(
        &self,
        ctx: &RequestContext,
        guid: TransactionGuid,
        legs: Vec<CardLeg>,
        status: TransactionStatus,
        created_by: Party,
    ) -> Result<Vec<CardTransaction>, LedgerError> {
        let created_at = Utc::now();
        legs.into_iter()
            .map(|leg| {
                let id = self
                    .store
                    .next_sequence(ctx, CARD_TRANSACTION_COUNTER)
                    .map_err(|e| {
                        LedgerError::system(format!("failed to issue card record id: {}", e))
                    })?;
                Ok(CardTransaction {
                    id,
                    transaction_guid: guid,
                    card_number: leg.card.card_number,
                    amount: leg.card.amount,
                    given_by: leg.given_by,
                    given_to: leg.given_to,
                    status,
                    created_at,
                    created_by,
                    updated_by: None,
                    updated_at: None,
                })
            })
            .collect()
    }

    /// Run `work` inside a store session
    ///
    /// Commits when `work` succeeds and aborts otherwise. A failed abort
    /// replaces the original error with a `SystemError` that carries both.
    pub(crate) fn in_session<T>(
        &self,
        ctx: &RequestContext,
        work: impl FnOnce(&mut dyn LedgerSession) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut session = self
            .store
            .start_session(ctx)
            .map_err(|e| LedgerError::system(format!("failed to start session: {}", e)))?;

        match work(&mut *session) {
            Ok(value) => {
                session.commit(ctx).map_err(|e| {
                    LedgerError::system(format!("failed to commit transaction: {}", e))
                })?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Aborting ledger session");
                if let Err(abort) = session.abort(ctx) {
                    return Err(LedgerError::system(format!(
                        "failed to abort transaction: {} (after: {})",
                        abort, err
                    )));
                }
                Err(err)
            }
        }
    }
}

/// `a - b` for cash, failing instead of going negative
pub(crate) fn debit_cash(account: &mut Account, amount: Decimal) -> Result<(), LedgerError> {
    let remaining = account
        .cash
        .checked_sub(amount)
        .filter(|remaining| *remaining >= Decimal::ZERO)
        .ok_or_else(|| {
            LedgerError::insufficient_cash(Party::User(account.user_id), account.cash, amount)
        })?;
    account.cash = remaining;
    Ok(())
}

pub(crate) fn credit_cash(account: &mut Account, amount: Decimal) -> Result<(), LedgerError> {
    account.cash = account.cash.checked_add(amount).ok_or_else(|| {
        LedgerError::system(format!("cash overflow for user {}", account.user_id))
    })?;
    Ok(())
}

pub(crate) fn debit_card(account: &mut Account, card: &CardAmount) -> Result<(), LedgerError> {
    let held = account.holding(&card.card_number);
    account
        .debit_card(&card.card_number, card.amount)
        .ok_or_else(|| {
            LedgerError::insufficient_cards(
                Party::User(account.user_id),
                &card.card_number,
                held,
                card.amount,
            )
        })
}

pub(crate) fn credit_card(account: &mut Account, card: &CardAmount) -> Result<(), LedgerError> {
    account
        .credit_card(&card.card_number, card.amount)
        .ok_or_else(|| {
            LedgerError::system(format!(
                "card {} overflow for user {}",
                card.card_number, account.user_id
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{Fault, MemoryStore};
    use crate::types::Role;

    fn engine() -> LedgerEngine<MemoryStore> {
        let store = MemoryStore::new();
        store.put_account(Account::new(1, Role::User));
        store.put_card(Card::new("X001", 10, 0));
        LedgerEngine::new(store)
    }

    #[test]
    fn test_load_user_not_found() {
        let engine = engine();
        let ctx = RequestContext::background();

        assert!(engine.load_user(&ctx, 1, "sender").is_ok());
        assert_eq!(
            engine.load_user(&ctx, 2, "receiver").unwrap_err(),
            LedgerError::not_found("receiver 2 not found")
        );
        assert!(matches!(
            engine.load_user(&ctx, 0, "user").unwrap_err(),
            LedgerError::BadRequest { .. }
        ));
    }

    #[test]
    fn test_load_cards_names_missing_numbers() {
        let engine = engine();
        let ctx = RequestContext::background();

        let err = engine
            .load_cards(&ctx, vec!["X001".to_string(), "Y999".to_string()])
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found("cards not found: Y999"));
    }

    #[test]
    fn test_in_session_aborts_on_error() {
        let engine = engine();
        let ctx = RequestContext::background();
        let record = engine
            .cash_record(
                &ctx,
                1,
                CashLeg {
                    amount: Decimal::ONE,
                    given_by: Party::System,
                    given_to: Party::User(1),
                },
                TransactionStatus::Pending,
                Party::System,
            )
            .unwrap();

        let result: Result<(), _> = engine.in_session(&ctx, |session| {
            session.insert_cash(&ctx, record)?;
            Err(LedgerError::bad_request("stop"))
        });

        assert_eq!(result.unwrap_err(), LedgerError::bad_request("stop"));
        assert!(engine.store().cash_records().is_empty());
    }

    #[test]
    fn test_failed_abort_overrides_original_error() {
        let engine = engine();
        let ctx = RequestContext::background();
        engine.store().arm_fault(Fault::Abort);

        let result: Result<(), _> =
            engine.in_session(&ctx, |_| Err(LedgerError::bad_request("stop")));

        match result.unwrap_err() {
            LedgerError::SystemError { message } => {
                assert!(message.contains("failed to abort transaction"));
                assert!(message.contains("stop"));
            }
            other => panic!("expected SystemError, got {:?}", other),
        }
    }

    #[test]
    fn test_commit_failure_is_system_error() {
        let engine = engine();
        let ctx = RequestContext::background();
        engine.store().arm_fault(Fault::Commit);

        let result = engine.in_session(&ctx, |_| Ok(()));

        assert!(matches!(result, Err(LedgerError::SystemError { .. })));
    }

    #[test]
    fn test_debit_cash_rejects_overdraft() {
        let mut account = Account::new(1, Role::User).with_cash(Decimal::from(5));

        assert!(debit_cash(&mut account, Decimal::from(6)).is_err());
        debit_cash(&mut account, Decimal::from(5)).unwrap();
        assert_eq!(account.cash, Decimal::ZERO);
    }
}
