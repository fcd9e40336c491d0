//! Concurrency tests
//!
//! Many engine calls race against one shared store on a multi-threaded tokio
//! runtime. Engine calls are blocking, so each runs on `spawn_blocking`.

#[cfg(test)]
mod tests {
    use card_ledger_engine::core::config::TRANSACTION_GUID_COUNTER;
    use card_ledger_engine::core::SequenceGenerator;
    use card_ledger_engine::types::{Role, TransferCashRequest};
    use card_ledger_engine::{
        Account, LedgerEngine, LedgerError, MemoryStore, Party, RequestContext, TransactionStatus,
    };
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn pay(from: u32, to: u32, amount: i64) -> TransferCashRequest {
        TransferCashRequest {
            user_id: from,
            given_by: Party::User(from),
            given_to: to,
            amount: Decimal::from(amount),
            status: TransactionStatus::Success,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_sequences_are_unique() {
        let store = Arc::new(MemoryStore::new());
        store.seed_counter(TRANSACTION_GUID_COUNTER, 500);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || {
                    let ctx = RequestContext::background();
                    (0..250)
                        .map(|_| store.next_sequence(&ctx, TRANSACTION_GUID_COUNTER).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.await.unwrap() {
                assert!(seen.insert(value), "sequence value {} issued twice", value);
            }
        }
        assert_eq!(seen.len(), 4000);
        assert_eq!(seen.iter().min(), Some(&501));
        assert_eq!(seen.iter().max(), Some(&4500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_no_double_spend_under_contention() {
        let store = MemoryStore::new();
        store.put_account(Account::new(1, Role::User).with_cash(Decimal::from(100)));
        for receiver in 2..=9 {
            store.put_account(Account::new(receiver, Role::User));
        }
        let engine = Arc::new(LedgerEngine::new(store));

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::task::spawn_blocking(move || {
                    let ctx = RequestContext::background();
                    engine.transfer_cash(&ctx, pay(1, 2 + (i % 8), 10))
                })
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => settled += 1,
                Err(LedgerError::InsufficientBalance { .. })
                | Err(LedgerError::SystemError { .. }) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }

        let store = engine.store();
        let payer = store.account(1).unwrap();
        let received: Decimal = (2..=9)
            .map(|id| store.account(id).unwrap().cash)
            .sum();

        assert!(settled <= 10, "{} transfers of 10 settled out of 100", settled);
        assert!(payer.cash >= Decimal::ZERO);
        assert_eq!(payer.cash + received, Decimal::from(100));
        assert_eq!(payer.cash, Decimal::from(100 - 10 * settled as i64));

        let success_records = store
            .cash_records()
            .iter()
            .filter(|record| record.status == TransactionStatus::Success)
            .count();
        assert_eq!(success_records, settled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirmations_settle_once() {
        let store = MemoryStore::new();
        store.put_account(Account::new(7, Role::User).with_cash(Decimal::from(50)));
        store.put_account(Account::new(8, Role::User));
        let engine = Arc::new(LedgerEngine::new(store));
        let ctx = RequestContext::background();
        let guid = engine
            .transfer_cash(
                &ctx,
                TransferCashRequest {
                    status: TransactionStatus::Pending,
                    ..pay(7, 8, 30)
                },
            )
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::task::spawn_blocking(move || {
                    engine.execute_exchange(&RequestContext::background(), 8, guid)
                })
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                settled += 1;
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(engine.store().account(7).unwrap().cash, Decimal::from(20));
        assert_eq!(engine.store().account(8).unwrap().cash, Decimal::from(30));
        assert_eq!(
            engine.store().cash_records()[0].status,
            TransactionStatus::Success
        );
    }
}
