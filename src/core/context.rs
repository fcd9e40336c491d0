//! Per-request context carried into every store call

use crate::types::StoreError;
use std::time::{Duration, Instant};

/// Request-scoped context
///
/// Carries the enclosing request's deadline. Stores call [`RequestContext::check`]
/// before doing any work so an expired request never reaches the ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without a deadline
    pub fn background() -> Self {
        RequestContext { deadline: None }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        RequestContext {
            deadline: Some(deadline),
        }
    }

    /// Context expiring `timeout` from now, or unbounded when `None`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        RequestContext {
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn check(&self) -> Result<(), StoreError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_expires() {
        assert!(RequestContext::background().check().is_ok());
    }

    #[test]
    fn test_expired_deadline_fails_check() {
        let ctx = RequestContext::with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.check(), Err(StoreError::DeadlineExceeded));
    }

    #[test]
    fn test_future_deadline_passes_check() {
        let ctx = RequestContext::with_timeout(Some(Duration::from_secs(60)));
        assert!(ctx.check().is_ok());
    }
}
