use crate::core::config::{EngineConfig, SettlementPolicy};
use crate::types::UserId;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay ledger commands against seeded accounts and a card catalog
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay card ledger commands and report balances or history", long_about = None)]
pub struct CliArgs {
    /// Commands CSV file path
    #[arg(value_name = "COMMANDS", help = "Path to the commands CSV file")]
    pub commands_file: PathBuf,

    /// Accounts CSV file path
    #[arg(
        long = "accounts",
        value_name = "PATH",
        help = "Accounts CSV seeding the store (user,role,cash,cards)"
    )]
    pub accounts_file: PathBuf,

    /// Card catalog CSV file path
    #[arg(
        long = "cards",
        value_name = "PATH",
        help = "Card catalog CSV seeding the store (number,total,occupied)"
    )]
    pub cards_file: Option<PathBuf>,

    /// Report one user's reconciled history instead of account balances
    #[arg(
        long = "history",
        value_name = "USER",
        help = "Print the reconciled transaction history of USER"
    )]
    pub history: Option<UserId>,

    /// What to do when a non-payer asks to settle a transfer
    #[arg(
        long = "settlement-policy",
        value_name = "POLICY",
        default_value = "reject",
        help = "'reject' fails the transfer, 'downgrade' records it as pending"
    )]
    pub settlement_policy: PolicyArg,

    /// Deadline applied to every engine call
    #[arg(
        long = "timeout-ms",
        value_name = "MS",
        help = "Per-command deadline in milliseconds (default: none)"
    )]
    pub timeout_ms: Option<u64>,

    /// Value the transaction GUID counter is provisioned with
    #[arg(
        long = "guid-seed",
        value_name = "SEED",
        help = "Last transaction GUID already issued (default: 0)"
    )]
    pub guid_seed: Option<u64>,
}

/// Settlement policies selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Reject,
    Downgrade,
}

impl From<PolicyArg> for SettlementPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Reject => SettlementPolicy::Reject,
            PolicyArg::Downgrade => SettlementPolicy::Downgrade,
        }
    }
}

impl CliArgs {
    /// Build the engine configuration from CLI arguments
    ///
    /// A zero timeout is ignored with a warning (see [`EngineConfig::new`]).
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.settlement_policy.into(), self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case::default_policy(&["program", "--accounts", "a.csv", "c.csv"], PolicyArg::Reject)]
    #[case::explicit_reject(&["program", "--accounts", "a.csv", "--settlement-policy", "reject", "c.csv"], PolicyArg::Reject)]
    #[case::downgrade(&["program", "--accounts", "a.csv", "--settlement-policy", "downgrade", "c.csv"], PolicyArg::Downgrade)]
    fn test_policy_parsing(#[case] args: &[&str], #[case] expected: PolicyArg) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.settlement_policy, expected);
    }

    #[rstest]
    #[case::no_options(&["program", "--accounts", "a.csv", "c.csv"], None, None, None)]
    #[case::history(&["program", "--accounts", "a.csv", "--history", "42", "c.csv"], Some(42), None, None)]
    #[case::timeout(&["program", "--accounts", "a.csv", "--timeout-ms", "250", "c.csv"], None, Some(250), None)]
    #[case::all_options(
        &["program", "--accounts", "a.csv", "--cards", "k.csv", "--history", "7", "--timeout-ms", "50", "--guid-seed", "1000", "c.csv"],
        Some(7),
        Some(50),
        Some(1000)
    )]
    fn test_options(
        #[case] args: &[&str],
        #[case] history: Option<UserId>,
        #[case] timeout_ms: Option<u64>,
        #[case] guid_seed: Option<u64>,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.history, history);
        assert_eq!(parsed.timeout_ms, timeout_ms);
        assert_eq!(parsed.guid_seed, guid_seed);
    }

    #[rstest]
    #[case::defaults(&["program", "--accounts", "a.csv", "c.csv"], SettlementPolicy::Reject, None)]
    #[case::zero_timeout_falls_back(&["program", "--accounts", "a.csv", "--timeout-ms", "0", "c.csv"], SettlementPolicy::Reject, None)]
    #[case::custom(
        &["program", "--accounts", "a.csv", "--settlement-policy", "downgrade", "--timeout-ms", "100", "c.csv"],
        SettlementPolicy::Downgrade,
        Some(Duration::from_millis(100))
    )]
    fn test_engine_config_conversion(
        #[case] args: &[&str],
        #[case] policy: SettlementPolicy,
        #[case] timeout: Option<Duration>,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_engine_config();

        assert_eq!(config.settlement_policy, policy);
        assert_eq!(config.request_timeout, timeout);
    }

    #[rstest]
    #[case::missing_commands(&["program", "--accounts", "a.csv"])]
    #[case::missing_accounts(&["program", "c.csv"])]
    #[case::invalid_policy(&["program", "--accounts", "a.csv", "--settlement-policy", "ignore", "c.csv"])]
    #[case::negative_history(&["program", "--accounts", "a.csv", "--history", "-1", "c.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
