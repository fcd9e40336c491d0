use super::{Fault, MemoryStore};
use crate::core::context::RequestContext;
use crate::core::traits::SequenceGenerator;
use crate::types::StoreError;

impl SequenceGenerator for MemoryStore {
    /// Increment and return the named counter
    ///
    /// The entry's shard lock is held across the read-increment-write, so no
    /// two callers observe the same value. Unprovisioned counters start at 0,
    /// making the first issued value 1.
    fn next_sequence(&self, ctx: &RequestContext, counter: &str) -> Result<u64, StoreError> {
        ctx.check()?;
        self.trip(Fault::Sequence)?;

        let mut value = self.counters.entry(counter.to_string()).or_insert(0);
        let next = value
            .checked_add(1)
            .ok_or_else(|| StoreError::CounterExhausted {
                counter: counter.to_string(),
            })?;
        *value = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_first_value_is_one() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();

        assert_eq!(store.next_sequence(&ctx, "guid").unwrap(), 1);
        assert_eq!(store.next_sequence(&ctx, "guid").unwrap(), 2);
    }

    #[test]
    fn test_counters_are_independent() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();

        store.next_sequence(&ctx, "a").unwrap();
        store.next_sequence(&ctx, "a").unwrap();

        assert_eq!(store.next_sequence(&ctx, "b").unwrap(), 1);
        assert_eq!(store.next_sequence(&ctx, "a").unwrap(), 3);
    }

    #[test]
    fn test_seeded_counter_continues_from_seed() {
        let store = MemoryStore::new();
        store.seed_counter("guid", 1000);

        let next = store
            .next_sequence(&RequestContext::background(), "guid")
            .unwrap();
        assert_eq!(next, 1001);
    }

    #[test]
    fn test_exhausted_counter_fails() {
        let store = MemoryStore::new();
        store.seed_counter("guid", u64::MAX);

        let result = store.next_sequence(&RequestContext::background(), "guid");
        assert!(matches!(result, Err(StoreError::CounterExhausted { .. })));
    }

    #[test]
    fn test_expired_context_does_not_increment() {
        let store = MemoryStore::new();
        let expired = RequestContext::with_deadline(Instant::now() - Duration::from_millis(1));

        assert_eq!(
            store.next_sequence(&expired, "guid"),
            Err(StoreError::DeadlineExceeded)
        );
        assert_eq!(
            store
                .next_sequence(&RequestContext::background(), "guid")
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_armed_fault_fails_once() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        store.arm_fault(Fault::Sequence);

        assert!(matches!(
            store.next_sequence(&ctx, "guid"),
            Err(StoreError::Injected(_))
        ));
        assert_eq!(store.next_sequence(&ctx, "guid").unwrap(), 1);
    }

    #[test]
    fn test_concurrent_callers_never_share_a_value() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let ctx = RequestContext::background();
                    (0..500)
                        .map(|_| store.next_sequence(&ctx, "guid").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate sequence value {}", value);
            }
        }
        assert_eq!(seen.len(), 4000);
        assert!(!seen.contains(&0));
    }
}
