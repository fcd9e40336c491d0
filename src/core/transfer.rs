//! Unilateral transfers
//!
//! A transfer moves cash or cards from a payer (a user or the system) to a
//! receiving user. It is recorded under a fresh GUID and settles immediately
//! when requested as `success`; otherwise it stays pending and balances are
//! left alone.

use crate::core::balance::{self, CardInventory};
use crate::core::config::SettlementPolicy;
use crate::core::context::RequestContext;
use crate::core::engine::{self, CardLeg, CashLeg, LedgerEngine};
use crate::core::traits::LedgerStore;
use crate::types::{
    Account, CardAmount, LedgerError, Party, TransactionGuid, TransactionStatus,
    TransferCardsRequest, TransferCashRequest, UserId,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};

impl<S: LedgerStore> LedgerEngine<S> {
    /// Move cash from `given_by` to `given_to`
    ///
    /// # Arguments
    ///
    /// * `ctx` - Request context whose deadline bounds every store call
    /// * `request` - The transfer, including the authenticated caller
    ///
    /// # Returns
    ///
    /// The GUID the transfer was recorded under
    ///
    /// # Errors
    ///
    /// - `NotFound` if the caller, payer or receiver does not exist
    /// - `BadRequest` for a non-positive amount or a self transfer
    /// - `Unauthorized` if the caller may not act for the payer or settle
    /// - `InsufficientBalance` if the payer cannot cover the amount
    /// - `SystemError` if issuing ids or committing fails
    pub fn transfer_cash(
        &self,
        ctx: &RequestContext,
        request: TransferCashRequest,
    ) -> Result<TransactionGuid, LedgerError> {
        let actor = self.load_user(ctx, request.user_id, "user")?;

        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::bad_request("amount must be greater than zero"));
        }
        validate_parties(request.given_by, request.given_to)?;
        let status = self.authorize_status(&actor, request.given_by, request.status)?;

        let payer = self.load_payer(ctx, request.given_by)?;
        let receiver = self.load_user(ctx, request.given_to, "receiver")?;

        let available = payer.as_ref().map_or(Decimal::ZERO, |account| account.cash);
        balance::check_cash(request.given_by, available, request.amount)?;

        let guid = self.next_guid(ctx)?;
        let record = self.cash_record(
            ctx,
            guid,
            CashLeg {
                amount: request.amount,
                given_by: request.given_by,
                given_to: Party::User(request.given_to),
            },
            status,
            Party::User(actor.user_id),
        )?;

        self.in_session(ctx, |session| {
            session.insert_cash(ctx, record)?;
            if status == TransactionStatus::Success {
                if let Some(mut payer) = payer {
                    engine::debit_cash(&mut payer, request.amount)?;
                    session.update_account(ctx, payer)?;
                }
                let mut receiver = receiver;
                engine::credit_cash(&mut receiver, request.amount)?;
                session.update_account(ctx, receiver)?;
            }
            Ok(())
        })?;

        info!(
            guid,
            given_by = %request.given_by,
            given_to = request.given_to,
            amount = %request.amount,
            status = %status,
            "Cash transfer recorded"
        );
        Ok(guid)
    }

    /// Move cards from `given_by` to `given_to`
    ///
    /// When the payer is the system the cards are minted out of catalog
    /// headroom (`total - occupied`) and settlement raises the catalog's
    /// `occupied` count.
    ///
    /// # Errors
    ///
    /// As [`LedgerEngine::transfer_cash`]; additionally `BadRequest` for an
    /// empty list, a zero amount or a repeated card number, and `NotFound` if
    /// any card number is not in the catalog.
    pub fn transfer_cards(
        &self,
        ctx: &RequestContext,
        request: TransferCardsRequest,
    ) -> Result<TransactionGuid, LedgerError> {
        let actor = self.load_user(ctx, request.user_id, "user")?;

        validate_card_list(&request.cards)?;
        validate_parties(request.given_by, request.given_to)?;
        let status = self.authorize_status(&actor, request.given_by, request.status)?;

        let payer = self.load_payer(ctx, request.given_by)?;
        let receiver = self.load_user(ctx, request.given_to, "receiver")?;
        let numbers = request
            .cards
            .iter()
            .map(|card| card.card_number.clone())
            .collect();
        let mut catalog = self.load_cards(ctx, numbers)?;

        let requested = balance::aggregate_cards(&request.cards)?;
        let inventory = match &payer {
            Some(account) => CardInventory::holdings_of(account),
            None => CardInventory::catalog(&catalog),
        };
        balance::check_cards(&requested, &inventory)?;

        let guid = self.next_guid(ctx)?;
        let legs = request
            .cards
            .iter()
            .map(|card| CardLeg {
                card: card.clone(),
                given_by: request.given_by,
                given_to: Party::User(request.given_to),
            })
            .collect();
        let records =
            self.card_records(ctx, guid, legs, status, Party::User(actor.user_id))?;

        self.in_session(ctx, |session| {
            session.insert_cards(ctx, records)?;
            if status != TransactionStatus::Success {
                return Ok(());
            }

            match payer {
                Some(mut payer) => {
                    for card in &request.cards {
                        engine::debit_card(&mut payer, card)?;
                    }
                    session.update_account(ctx, payer)?;
                }
                None => {
                    for card in catalog.iter_mut() {
                        let minted = requested.get(&card.number).copied().unwrap_or(0);
                        card.occupied = card
                            .occupied
                            .checked_add(minted)
                            .filter(|occupied| *occupied <= card.total)
                            .ok_or_else(|| {
                                LedgerError::insufficient_cards(
                                    Party::System,
                                    &card.number,
                                    card.available(),
                                    minted,
                                )
                            })?;
                    }
                    session.update_cards(ctx, catalog)?;
                }
            }

            let mut receiver = receiver;
            for card in &request.cards {
                engine::credit_card(&mut receiver, card)?;
            }
            session.update_account(ctx, receiver)?;
            Ok(())
        })?;

        info!(
            guid,
            given_by = %request.given_by,
            given_to = request.given_to,
            cards = request.cards.len(),
            status = %status,
            "Card transfer recorded"
        );
        Ok(guid)
    }

    /// Mint cards from the catalog straight into a user's holdings
    ///
    /// Only admins may give cards. The transfer is recorded as settled.
    pub fn give_cards(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        given_to: UserId,
        cards: Vec<CardAmount>,
    ) -> Result<TransactionGuid, LedgerError> {
        let actor = self.load_user(ctx, user_id, "user")?;
        if !actor.is_admin() {
            return Err(LedgerError::unauthorized(format!(
                "user {} is not allowed to give cards",
                user_id
            )));
        }

        self.transfer_cards(
            ctx,
            TransferCardsRequest {
                user_id,
                given_by: Party::System,
                given_to,
                cards,
                status: TransactionStatus::Success,
            },
        )
    }

    /// Decide the status a transfer is recorded with
    ///
    /// Only the payer itself (or an admin, for system-funded transfers) may
    /// settle immediately. What happens to anyone else asking for `success`
    /// is governed by the configured [`SettlementPolicy`].
    fn authorize_status(
        &self,
        actor: &Account,
        given_by: Party,
        requested: TransactionStatus,
    ) -> Result<TransactionStatus, LedgerError> {
        if given_by.is_system() && !actor.is_admin() {
            return Err(LedgerError::unauthorized(format!(
                "user {} cannot transfer on behalf of the system",
                actor.user_id
            )));
        }

        if requested != TransactionStatus::Success {
            return Ok(TransactionStatus::Pending);
        }
        let owner = given_by.is_system() || given_by == Party::User(actor.user_id);
        if owner {
            return Ok(TransactionStatus::Success);
        }

        match self.config().settlement_policy {
            SettlementPolicy::Reject => Err(LedgerError::unauthorized(format!(
                "user {} cannot settle a transfer paid by {}",
                actor.user_id, given_by
            ))),
            SettlementPolicy::Downgrade => {
                debug!(
                    actor = actor.user_id,
                    given_by = %given_by,
                    "Downgrading transfer to pending"
                );
                Ok(TransactionStatus::Pending)
            }
        }
    }

    fn load_payer(
        &self,
        ctx: &RequestContext,
        given_by: Party,
    ) -> Result<Option<Account>, LedgerError> {
        match given_by {
            Party::System => Ok(None),
            Party::User(id) => self.load_user(ctx, id, "sender").map(Some),
        }
    }
}

fn validate_parties(given_by: Party, given_to: UserId) -> Result<(), LedgerError> {
    if given_to == 0 {
        return Err(LedgerError::bad_request("receiver is required"));
    }
    if given_by == Party::User(given_to) {
        return Err(LedgerError::bad_request(
            "sender and receiver cannot be the same user",
        ));
    }
    Ok(())
}

fn validate_card_list(cards: &[CardAmount]) -> Result<(), LedgerError> {
    if cards.is_empty() {
        return Err(LedgerError::bad_request("at least one card is required"));
    }
    let mut seen = HashSet::new();
    for card in cards {
        if card.amount == 0 {
            return Err(LedgerError::bad_request(format!(
                "card {} amount must be greater than zero",
                card.card_number
            )));
        }
        if !seen.insert(card.card_number.as_str()) {
            return Err(LedgerError::bad_request(format!(
                "card {} is listed more than once",
                card.card_number
            )));
        }
    }
    Ok(())
}
