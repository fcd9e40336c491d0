//! Engine configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Counter issuing cash record ids
pub const CASH_TRANSACTION_COUNTER: &str = "cash_transaction_id";
/// Counter issuing card record ids
pub const CARD_TRANSACTION_COUNTER: &str = "card_transaction_id";
/// Counter issuing transaction GUIDs
pub const TRANSACTION_GUID_COUNTER: &str = "transaction_guid";

/// What to do when someone other than the payer asks for immediate settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlementPolicy {
    /// Fail the request with `Unauthorized`
    #[default]
    Reject,
    /// Record the transfer as pending instead
    Downgrade,
}

impl FromStr for SettlementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(SettlementPolicy::Reject),
            "downgrade" => Ok(SettlementPolicy::Downgrade),
            other => Err(format!("unknown settlement policy '{}'", other)),
        }
    }
}

impl fmt::Display for SettlementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementPolicy::Reject => f.write_str("reject"),
            SettlementPolicy::Downgrade => f.write_str("downgrade"),
        }
    }
}

/// Configuration for the ledger engine
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub settlement_policy: SettlementPolicy,
    /// Deadline applied to each engine call; `None` leaves calls unbounded
    pub request_timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new(settlement_policy: SettlementPolicy, request_timeout_ms: Option<u64>) -> Self {
        let request_timeout = match request_timeout_ms {
            Some(0) => {
                tracing::warn!("Invalid request timeout (0 ms), running without a deadline");
                None
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };
        EngineConfig {
            settlement_policy,
            request_timeout,
        }
    }
}
