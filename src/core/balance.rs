//! Affordability checks
//!
//! Pure functions deciding whether a proposed cash or card movement can be
//! covered by a snapshot of the payer's balances. Nothing here touches a store.

use crate::types::{Account, Card, CardAmount, CardNumber, LedgerError, Party};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Where the paying side's cards come from
#[derive(Debug, Clone)]
pub enum CardInventory {
    /// A user's personal holdings: card number to occupied units
    Holdings {
        holder: Party,
        units: HashMap<CardNumber, u32>,
    },
    /// The catalog, for system mints: card number to catalog entry
    Catalog(HashMap<CardNumber, Card>),
}

impl CardInventory {
    /// Holdings of an account, summing duplicate entries
    pub fn holdings_of(account: &Account) -> Self {
        let mut units: HashMap<CardNumber, u32> = HashMap::new();
        for holding in &account.cards {
            let entry = units.entry(holding.card_number.clone()).or_insert(0);
            *entry = entry.saturating_add(holding.occupied);
        }
        CardInventory::Holdings {
            holder: Party::User(account.user_id),
            units,
        }
    }

    pub fn catalog(cards: &[Card]) -> Self {
        CardInventory::Catalog(
            cards
                .iter()
                .map(|card| (card.number.clone(), card.clone()))
                .collect(),
        )
    }

    fn holder(&self) -> Party {
        match self {
            CardInventory::Holdings { holder, .. } => *holder,
            CardInventory::Catalog(_) => Party::System,
        }
    }

    /// Units this inventory can give away; `None` if the card is unknown to it
    fn available(&self, card_number: &str) -> Option<u32> {
        match self {
            CardInventory::Holdings { units, .. } => units.get(card_number).copied(),
            CardInventory::Catalog(cards) => cards.get(card_number).map(Card::available),
        }
    }
}

/// Whether `payer` can pay `amount` out of `available_cash`
///
/// The system always affords.
pub fn can_afford_cash(payer: Party, available_cash: Decimal, amount: Decimal) -> bool {
    match payer {
        Party::System => true,
        Party::User(_) => available_cash >= amount,
    }
}

/// Like [`can_afford_cash`], but returns the error naming the shortfall
pub fn check_cash(
    payer: Party,
    available_cash: Decimal,
    amount: Decimal,
) -> Result<(), LedgerError> {
    if can_afford_cash(payer, available_cash, amount) {
        Ok(())
    } else {
        Err(LedgerError::insufficient_cash(payer, available_cash, amount))
    }
}

/// Sum requested units per card number
///
/// Ordered by card number so the first offending card reported is deterministic.
pub fn aggregate_cards(cards: &[CardAmount]) -> Result<BTreeMap<CardNumber, u32>, LedgerError> {
    let mut requested: BTreeMap<CardNumber, u32> = BTreeMap::new();
    for card in cards {
        let entry = requested.entry(card.card_number.clone()).or_insert(0);
        *entry = entry.checked_add(card.amount).ok_or_else(|| {
            LedgerError::bad_request(format!("card {} amount overflows", card.card_number))
        })?;
    }
    Ok(requested)
}

/// Check every requested card against the payer's inventory
///
/// A card missing from the inventory counts as zero available units.
pub fn check_cards(
    requested: &BTreeMap<CardNumber, u32>,
    inventory: &CardInventory,
) -> Result<(), LedgerError> {
    for (card_number, &amount) in requested {
        let available = inventory.available(card_number).unwrap_or(0);
        if available < amount {
            return Err(LedgerError::insufficient_cards(
                inventory.holder(),
                card_number,
                available,
                amount,
            ));
        }
    }
    Ok(())
}
