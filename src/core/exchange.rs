//! Bilateral exchanges
//!
//! An exchange is a barter proposal: the initiator offers cards (and maybe
//! cash) and asks for cards (or cash) in return. Proposing only writes pending
//! ledger legs under one GUID; balances move when the counterparty confirms
//! (see `settlement`).

use crate::core::balance::{self, CardInventory};
use crate::core::context::RequestContext;
use crate::core::engine::{CardLeg, CashLeg, LedgerEngine};
use crate::core::traits::{CardFilter, LedgerStore};
use crate::types::{
    Account, Card, CardNumber, ExchangeOverview, ExchangeRequest, HeldCard,
    LedgerError, Party, TransactionGuid, TransactionStatus, UserId,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};

impl<S: LedgerStore> LedgerEngine<S> {
    /// Record a pending exchange between two users
    ///
    /// One card leg is written per entry of `cards_sent` (initiator to
    /// counterparty) and `cards_received` (counterparty to initiator). At most
    /// one cash leg is written, in whichever direction carries cash. All legs
    /// share a freshly issued GUID and are created by the initiator, including
    /// the legs the counterparty gives; confirmation reads the proposer from
    /// `created_by` of any leg.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for a self exchange, a card on both sides, a zero card
    ///   amount, negative cash, cash in both directions or an empty exchange
    /// - `NotFound` for an unknown user or card
    /// - `InsufficientBalance` if either side cannot cover its part
    /// - `SystemError` if issuing ids or committing fails
    pub fn exchange(
        &self,
        ctx: &RequestContext,
        request: ExchangeRequest,
    ) -> Result<TransactionGuid, LedgerError> {
        validate_exchange(&request)?;

        let initiator = self.load_user(ctx, request.given_by, "sender")?;
        let counterparty = self.load_user(ctx, request.given_to, "receiver")?;

        let numbers: Vec<CardNumber> = request
            .cards_sent
            .iter()
            .chain(&request.cards_received)
            .map(|card| card.card_number.clone())
            .collect();
        if !numbers.is_empty() {
            self.load_cards(ctx, numbers)?;
        }

        let sent = balance::aggregate_cards(&request.cards_sent)?;
        balance::check_cards(&sent, &CardInventory::holdings_of(&initiator))?;
        let received = balance::aggregate_cards(&request.cards_received)?;
        balance::check_cards(&received, &CardInventory::holdings_of(&counterparty))?;

        let from = Party::User(initiator.user_id);
        let to = Party::User(counterparty.user_id);
        balance::check_cash(from, initiator.cash, request.cash_sent)?;
        balance::check_cash(to, counterparty.cash, request.cash_received)?;

        let guid = self.next_guid(ctx)?;
        let legs: Vec<CardLeg> = request
            .cards_sent
            .iter()
            .map(|card| CardLeg {
                card: card.clone(),
                given_by: from,
                given_to: to,
            })
            .chain(request.cards_received.iter().map(|card| CardLeg {
                card: card.clone(),
                given_by: to,
                given_to: from,
            }))
            .collect();
        let card_records = self.card_records(ctx, guid, legs, TransactionStatus::Pending, from)?;

        let cash_leg = if request.cash_sent > Decimal::ZERO {
            Some(CashLeg {
                amount: request.cash_sent,
                given_by: from,
                given_to: to,
            })
        } else if request.cash_received > Decimal::ZERO {
            Some(CashLeg {
                amount: request.cash_received,
                given_by: to,
                given_to: from,
            })
        } else {
            None
        };
        let cash_record = cash_leg
            .map(|leg| self.cash_record(ctx, guid, leg, TransactionStatus::Pending, from))
            .transpose()?;

        let card_legs = card_records.len();
        self.in_session(ctx, |session| {
            if !card_records.is_empty() {
                session.insert_cards(ctx, card_records)?;
            }
            if let Some(record) = cash_record {
                session.insert_cash(ctx, record)?;
            }
            Ok(())
        })?;

        info!(
            guid,
            given_by = request.given_by,
            given_to = request.given_to,
            card_legs,
            cash_leg = cash_leg.is_some(),
            "Exchange proposed"
        );
        Ok(guid)
    }

    /// What `user_id` and `trader_id` could each put into an exchange
    ///
    /// # Errors
    ///
    /// `BadRequest` when both ids are the same user, `NotFound` if either
    /// account does not exist.
    pub fn possible_exchange(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        trader_id: UserId,
    ) -> Result<ExchangeOverview, LedgerError> {
        if user_id == trader_id {
            return Err(LedgerError::bad_request("cannot exchange with yourself"));
        }
        let user = self.load_user(ctx, user_id, "user")?;
        let trader = self.load_user(ctx, trader_id, "trader")?;

        Ok(ExchangeOverview {
            your_cash: user.cash,
            trader_cash: trader.cash,
            your_cards: self.held_cards(ctx, &user)?,
            trader_cards: self.held_cards(ctx, &trader)?,
        })
    }

    /// Holdings of `account` joined with their catalog entries
    ///
    /// Holdings whose card has vanished from the catalog are skipped.
    fn held_cards(
        &self,
        ctx: &RequestContext,
        account: &Account,
    ) -> Result<Vec<HeldCard>, LedgerError> {
        if account.cards.is_empty() {
            return Ok(Vec::new());
        }
        let numbers = account
            .cards
            .iter()
            .map(|holding| holding.card_number.clone())
            .collect();
        let catalog: Vec<Card> = self
            .store()
            .get_cards(ctx, &CardFilter::Numbers(numbers))?;

        let held = account
            .cards
            .iter()
            .filter_map(|holding| {
                let card = catalog
                    .iter()
                    .find(|card| card.number == holding.card_number);
                if card.is_none() {
                    debug!(
                        user = account.user_id,
                        card = %holding.card_number,
                        "Skipping holding missing from catalog"
                    );
                }
                card.map(|card| HeldCard {
                    card: card.clone(),
                    units: holding.occupied,
                })
            })
            .collect();
        Ok(held)
    }
}

fn validate_exchange(request: &ExchangeRequest) -> Result<(), LedgerError> {
    if request.given_by == 0 || request.given_to == 0 {
        return Err(LedgerError::bad_request("both exchange parties are required"));
    }
    if request.given_by == request.given_to {
        return Err(LedgerError::bad_request("cannot exchange with yourself"));
    }

    let sent: HashSet<&str> = request
        .cards_sent
        .iter()
        .map(|card| card.card_number.as_str())
        .collect();
    if let Some(card) = request
        .cards_received
        .iter()
        .find(|card| sent.contains(card.card_number.as_str()))
    {
        return Err(LedgerError::bad_request(format!(
            "card {} cannot be both sent and received",
            card.card_number
        )));
    }

    if let Some(card) = request
        .cards_sent
        .iter()
        .chain(&request.cards_received)
        .find(|card| card.amount == 0)
    {
        return Err(LedgerError::bad_request(format!(
            "card {} amount must be greater than zero",
            card.card_number
        )));
    }

    if request.cash_sent < Decimal::ZERO || request.cash_received < Decimal::ZERO {
        return Err(LedgerError::bad_request("cash amounts cannot be negative"));
    }
    if request.cash_sent > Decimal::ZERO && request.cash_received > Decimal::ZERO {
        return Err(LedgerError::bad_request(
            "cash can only move in one direction per exchange",
        ));
    }

    let moves_cards = !request.cards_sent.is_empty() || !request.cards_received.is_empty();
    let moves_cash = request.cash_sent > Decimal::ZERO || request.cash_received > Decimal::ZERO;
    if !moves_cards && !moves_cash {
        return Err(LedgerError::bad_request("exchange must move at least one asset"));
    }
    Ok(())
}
