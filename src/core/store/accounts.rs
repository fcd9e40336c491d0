use super::MemoryStore;
use crate::core::context::RequestContext;
use crate::core::traits::{AccountFilter, AccountStore, CardCatalog, CardFilter};
use crate::types::{Account, Card, StoreError};

impl AccountStore for MemoryStore {
    fn get_accounts(
        &self,
        ctx: &RequestContext,
        filter: &AccountFilter,
    ) -> Result<Vec<Account>, StoreError> {
        ctx.check()?;
        let ids = match filter {
            AccountFilter::Id(id) => std::slice::from_ref(id),
            AccountFilter::Ids(ids) => ids.as_slice(),
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.accounts.get(id).map(|entry| entry.value().clone()))
            .collect())
    }
}

impl CardCatalog for MemoryStore {
    fn get_cards(
        &self,
        ctx: &RequestContext,
        filter: &CardFilter,
    ) -> Result<Vec<Card>, StoreError> {
        ctx.check()?;
        let numbers = match filter {
            CardFilter::Number(number) => std::slice::from_ref(number),
            CardFilter::Numbers(numbers) => numbers.as_slice(),
        };
        let mut cards: Vec<Card> = Vec::with_capacity(numbers.len());
        for number in numbers {
            if cards.iter().any(|card| &card.number == number) {
                continue;
            }
            if let Some(entry) = self.catalog.get(number) {
                cards.push(entry.value().clone());
            }
        }
        Ok(cards)
    }
}
