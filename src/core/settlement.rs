//! Confirming and declining pending transactions
//!
//! Every leg recorded under a GUID moves together: confirming settles all of
//! them (`Pending -> Success`) and applies their balance effects in one
//! session, declining fails all of them (`Pending -> Failed`) without touching
//! balances.

use crate::core::context::RequestContext;
use crate::core::engine::{self, LedgerEngine};
use crate::core::traits::{LedgerStore, StatusUpdate};
use crate::types::{
    Account, CardAmount, CardTransaction, CashTransaction, LedgerError, Party, TransactionGuid,
    TransactionStatus, UserId,
};
use std::collections::BTreeMap;
use tracing::info;

/// Every ledger record sharing one GUID
#[derive(Debug)]
struct Legs {
    guid: TransactionGuid,
    cash: Vec<CashTransaction>,
    cards: Vec<CardTransaction>,
}

impl Legs {
    fn creator(&self) -> Option<Party> {
        self.cards
            .first()
            .map(|record| record.created_by)
            .or_else(|| self.cash.first().map(|record| record.created_by))
    }

    /// `(given_by, given_to)` of every leg
    fn movements(&self) -> impl Iterator<Item = (Party, Party)> + '_ {
        self.cards
            .iter()
            .map(|record| (record.given_by, record.given_to))
            .chain(self.cash.iter().map(|record| (record.given_by, record.given_to)))
    }

    fn involves(&self, party: Party) -> bool {
        self.movements()
            .any(|(given_by, given_to)| given_by == party || given_to == party)
    }

    fn ensure_pending(&self) -> Result<(), LedgerError> {
        let settled = self
            .cards
            .iter()
            .map(|record| record.status)
            .chain(self.cash.iter().map(|record| record.status))
            .find(|status| *status != TransactionStatus::Pending);
        match settled {
            Some(status) => Err(LedgerError::bad_request(format!(
                "transaction {} is already {}",
                self.guid, status
            ))),
            None => Ok(()),
        }
    }

    fn status_update(&self, status: TransactionStatus, updated_by: Party) -> StatusUpdate {
        StatusUpdate {
            guid: self.guid,
            status,
            updated_by,
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Confirm a pending exchange and settle every leg
    ///
    /// The acting user must be a party to the exchange other than the one who
    /// proposed it, and every party giving something up must be either the
    /// proposer or the acting user. Balances are re-checked against current
    /// holdings before anything is written.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user or the transaction does not exist
    /// - `Unauthorized` if the user may not confirm this transaction
    /// - `BadRequest` if any leg is no longer pending
    /// - `InsufficientBalance` if a giving party can no longer cover its legs
    /// - `SystemError` on store or commit failure, including a concurrent
    ///   confirmation of the same transaction
    pub fn execute_exchange(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        guid: TransactionGuid,
    ) -> Result<(), LedgerError> {
        let actor = self.load_user(ctx, user_id, "user")?;
        let acting = Party::User(actor.user_id);
        let legs = self.load_legs(ctx, guid)?;
        legs.ensure_pending()?;

        let creator = legs.creator();
        if !legs.involves(acting) {
            return Err(LedgerError::unauthorized(format!(
                "user {} is not a party to transaction {}",
                user_id, guid
            )));
        }
        if creator == Some(acting) {
            return Err(LedgerError::unauthorized(format!(
                "transaction {} was proposed by user {} and needs the counterparty to confirm",
                guid, user_id
            )));
        }
        if let Some((giver, _)) = legs
            .movements()
            .find(|(given_by, _)| Some(*given_by) != creator && *given_by != acting)
        {
            return Err(LedgerError::unauthorized(format!(
                "{} has not agreed to give up assets in transaction {}",
                giver, guid
            )));
        }

        let mut accounts: BTreeMap<UserId, Account> = BTreeMap::new();
        for (given_by, given_to) in legs.movements() {
            for party in [given_by, given_to] {
                if let Some(id) = party.user_id() {
                    if !accounts.contains_key(&id) {
                        accounts.insert(id, self.load_user(ctx, id, "party")?);
                    }
                }
            }
        }

        for record in &legs.cards {
            let card = CardAmount::new(record.card_number.clone(), record.amount);
            engine::debit_card(party_account(&mut accounts, record.given_by)?, &card)?;
            engine::credit_card(party_account(&mut accounts, record.given_to)?, &card)?;
        }
        for record in &legs.cash {
            engine::debit_cash(party_account(&mut accounts, record.given_by)?, record.amount)?;
            engine::credit_cash(party_account(&mut accounts, record.given_to)?, record.amount)?;
        }

        let update = legs.status_update(TransactionStatus::Success, acting);
        self.in_session(ctx, |session| {
            for account in accounts.into_values() {
                session.update_account(ctx, account)?;
            }
            if !legs.cards.is_empty() {
                session.update_card_status(ctx, update)?;
            }
            if !legs.cash.is_empty() {
                session.update_cash_status(ctx, update)?;
            }
            Ok(())
        })?;

        info!(
            guid,
            confirmed_by = user_id,
            card_legs = legs.cards.len(),
            cash_legs = legs.cash.len(),
            "Exchange settled"
        );
        Ok(())
    }

    /// Decline a pending transaction, failing every leg
    ///
    /// Either party, or whoever proposed it, may decline. Balances are not
    /// touched.
    pub fn decline_exchange(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        guid: TransactionGuid,
    ) -> Result<(), LedgerError> {
        let actor = self.load_user(ctx, user_id, "user")?;
        let acting = Party::User(actor.user_id);
        let legs = self.load_legs(ctx, guid)?;
        legs.ensure_pending()?;

        if !legs.involves(acting) && legs.creator() != Some(acting) {
            return Err(LedgerError::unauthorized(format!(
                "user {} is not a party to transaction {}",
                user_id, guid
            )));
        }

        let update = legs.status_update(TransactionStatus::Failed, acting);
        self.in_session(ctx, |session| {
            if !legs.cards.is_empty() {
                session.update_card_status(ctx, update)?;
            }
            if !legs.cash.is_empty() {
                session.update_cash_status(ctx, update)?;
            }
            Ok(())
        })?;

        info!(guid, declined_by = user_id, "Exchange declined");
        Ok(())
    }

    fn load_legs(&self, ctx: &RequestContext, guid: TransactionGuid) -> Result<Legs, LedgerError> {
        let legs = Legs {
            guid,
            cash: self.store().cash_by_guid(ctx, guid)?,
            cards: self.store().cards_by_guid(ctx, guid)?,
        };
        if legs.cash.is_empty() && legs.cards.is_empty() {
            return Err(LedgerError::not_found(format!(
                "transaction {} not found",
                guid
            )));
        }
        Ok(legs)
    }
}

fn party_account(
    accounts: &mut BTreeMap<UserId, Account>,
    party: Party,
) -> Result<&mut Account, LedgerError> {
    party
        .user_id()
        .and_then(|id| accounts.get_mut(&id))
        .ok_or_else(|| LedgerError::system(format!("no account loaded for {}", party)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{Fault, MemoryStore};
    use crate::types::{Card, ExchangeRequest, Role, TransferCashRequest};
    use rust_decimal::Decimal;
    use rstest::{fixture, rstest};

    #[fixture]
    fn engine() -> LedgerEngine<MemoryStore> {
        let store = MemoryStore::new();
        store.put_account(
            Account::new(7, Role::User)
                .with_cash(Decimal::from(100))
                .with_card("X001", 5),
        );
        store.put_account(
            Account::new(8, Role::User)
                .with_cash(Decimal::from(40))
                .with_card("X002", 2),
        );
        store.put_account(Account::new(9, Role::User));
        store.put_card(Card::new("X001", 50, 5));
        store.put_card(Card::new("X002", 50, 2));
        LedgerEngine::new(store)
    }

    /// 7 offers 3 X001 plus 20 cash for 2 X002 from 8
    fn propose(engine: &LedgerEngine<MemoryStore>) -> TransactionGuid {
        engine
            .exchange(
                &RequestContext::background(),
                ExchangeRequest {
                    given_by: 7,
                    given_to: 8,
                    cash_sent: Decimal::from(20),
                    cash_received: Decimal::ZERO,
                    cards_sent: vec![CardAmount::new("X001", 3)],
                    cards_received: vec![CardAmount::new("X002", 2)],
                },
            )
            .unwrap()
    }

    #[rstest]
    fn test_counterparty_confirms(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);

        engine.execute_exchange(&ctx, 8, guid).unwrap();

        let initiator = engine.store().account(7).unwrap();
        let counterparty = engine.store().account(8).unwrap();
        assert_eq!(initiator.cash, Decimal::from(80));
        assert_eq!(initiator.holding("X001"), 2);
        assert_eq!(initiator.holding("X002"), 2);
        assert_eq!(counterparty.cash, Decimal::from(60));
        assert_eq!(counterparty.holding("X001"), 3);
        assert_eq!(counterparty.holding("X002"), 0);

        let cards = engine.store().card_records();
        assert!(cards
            .iter()
            .all(|record| record.status == TransactionStatus::Success
                && record.updated_by == Some(Party::User(8))));
        assert_eq!(
            engine.store().cash_records()[0].status,
            TransactionStatus::Success
        );
    }

    #[rstest]
    #[case::proposer(7)]
    #[case::outsider(9)]
    fn test_only_counterparty_confirms(engine: LedgerEngine<MemoryStore>, #[case] user: UserId) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);

        let err = engine.execute_exchange(&ctx, user, guid).unwrap_err();

        assert!(matches!(err, LedgerError::Unauthorized { .. }));
        assert_eq!(engine.store().account(7).unwrap().cash, Decimal::from(100));
    }

    #[rstest]
    fn test_receiver_cannot_pull_third_party_transfer(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();
        let guid = engine
            .transfer_cash(
                &ctx,
                TransferCashRequest {
                    user_id: 9,
                    given_by: Party::User(7),
                    given_to: 8,
                    amount: Decimal::from(50),
                    status: TransactionStatus::Pending,
                },
            )
            .unwrap();

        let err = engine.execute_exchange(&ctx, 8, guid).unwrap_err();

        assert!(matches!(err, LedgerError::Unauthorized { .. }));
        engine.execute_exchange(&ctx, 7, guid).unwrap();
        assert_eq!(engine.store().account(8).unwrap().cash, Decimal::from(90));
    }

    #[rstest]
    fn test_confirm_twice_fails(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);
        engine.execute_exchange(&ctx, 8, guid).unwrap();

        let err = engine.execute_exchange(&ctx, 8, guid).unwrap_err();

        assert!(matches!(err, LedgerError::BadRequest { .. }));
        assert_eq!(engine.store().account(8).unwrap().cash, Decimal::from(60));
    }

    #[rstest]
    fn test_holdings_rechecked_at_confirmation(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);
        engine
            .transfer_cash(
                &ctx,
                TransferCashRequest {
                    user_id: 7,
                    given_by: Party::User(7),
                    given_to: 9,
                    amount: Decimal::from(90),
                    status: TransactionStatus::Success,
                },
            )
            .unwrap();

        let err = engine.execute_exchange(&ctx, 8, guid).unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(engine.store().account(8).unwrap().holding("X002"), 2);
        assert!(engine
            .store()
            .card_records()
            .iter()
            .all(|record| record.status == TransactionStatus::Pending));
    }

    #[rstest]
    fn test_commit_fault_leaves_exchange_pending(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);
        engine.store().arm_fault(Fault::Commit);

        assert!(engine.execute_exchange(&ctx, 8, guid).is_err());
        assert_eq!(engine.store().account(7).unwrap().cash, Decimal::from(100));
        engine.execute_exchange(&ctx, 8, guid).unwrap();
    }

    #[rstest]
    #[case::counterparty(8)]
    #[case::proposer(7)]
    fn test_decline_fails_every_leg(engine: LedgerEngine<MemoryStore>, #[case] user: UserId) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);

        engine.decline_exchange(&ctx, user, guid).unwrap();

        assert!(engine
            .store()
            .card_records()
            .iter()
            .all(|record| record.status == TransactionStatus::Failed));
        assert_eq!(
            engine.store().cash_records()[0].status,
            TransactionStatus::Failed
        );
        assert_eq!(engine.store().account(7).unwrap().holding("X001"), 5);
        assert!(matches!(
            engine.execute_exchange(&ctx, 8, guid),
            Err(LedgerError::BadRequest { .. })
        ));
    }

    #[rstest]
    fn test_outsider_cannot_decline(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();
        let guid = propose(&engine);

        let err = engine.decline_exchange(&ctx, 9, guid).unwrap_err();

        assert!(matches!(err, LedgerError::Unauthorized { .. }));
    }

    #[rstest]
    fn test_unknown_transaction(engine: LedgerEngine<MemoryStore>) {
        let ctx = RequestContext::background();

        assert!(matches!(
            engine.execute_exchange(&ctx, 8, 404),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            engine.decline_exchange(&ctx, 8, 404),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
