//! Account and catalog types for the card ledger engine
//!
//! These mirror what the account store and card catalog expose to the engine:
//! a user's cash balance and card holdings, and a card's total/occupied counts.

use super::transaction::{CardNumber, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Account role
///
/// Only admins may move assets on behalf of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" | "" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Units of one card held by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHolding {
    pub card_number: CardNumber,
    pub occupied: u32,
}

/// Player account state as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub role: Role,
    pub cash: Decimal,
    pub cards: Vec<CardHolding>,

    /// Store-managed write version
    ///
    /// Bumped on every committed update. A session whose staged copy carries a
    /// stale version fails to commit.
    pub version: u64,
}

impl Account {
    /// Create a new account with no cash and no cards
    pub fn new(user_id: UserId, role: Role) -> Self {
        Account {
            user_id,
            role,
            cash: Decimal::ZERO,
            cards: Vec::new(),
            version: 0,
        }
    }

    pub fn with_cash(mut self, cash: Decimal) -> Self {
        self.cash = cash;
        self
    }

    /// Add units of a card, saturating at `u32::MAX` units held
    ///
    /// Seed readers that must reject overflow use [`Account::credit_card`].
    pub fn with_card(mut self, card_number: impl Into<CardNumber>, occupied: u32) -> Self {
        let card_number = card_number.into();
        let units = occupied.min(u32::MAX - self.holding(&card_number));
        self.credit_card(&card_number, units);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Units of `card_number` held, summed over duplicate entries
    pub fn holding(&self, card_number: &str) -> u32 {
        self.cards
            .iter()
            .filter(|holding| holding.card_number == card_number)
            .map(|holding| holding.occupied)
            .sum()
    }

    /// Add units of a card, creating the holding if the account had none
    pub fn credit_card(&mut self, card_number: &str, units: u32) -> Option<()> {
        match self
            .cards
            .iter_mut()
            .find(|holding| holding.card_number == card_number)
        {
            Some(holding) => holding.occupied = holding.occupied.checked_add(units)?,
            None => self.cards.push(CardHolding {
                card_number: card_number.to_string(),
                occupied: units,
            }),
        }
        Some(())
    }

    /// Remove units of a card; the holding is dropped once it reaches zero
    ///
    /// Returns `None` (leaving the account untouched) if the account holds
    /// fewer than `units`.
    pub fn debit_card(&mut self, card_number: &str, units: u32) -> Option<()> {
        let index = self
            .cards
            .iter()
            .position(|holding| holding.card_number == card_number)?;
        let remaining = self.cards[index].occupied.checked_sub(units)?;
        if remaining == 0 {
            self.cards.remove(index);
        } else {
            self.cards[index].occupied = remaining;
        }
        Some(())
    }
}

/// Card catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub number: CardNumber,
    pub total: u32,
    pub occupied: u32,
    pub version: u64,
}

impl Card {
    pub fn new(number: impl Into<CardNumber>, total: u32, occupied: u32) -> Self {
        Card {
            number: number.into(),
            total,
            occupied,
            version: 0,
        }
    }

    /// Units the system can still mint
    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.occupied)
    }
}
