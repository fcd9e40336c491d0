//! CSV format handling for seeds, commands and reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - Row structures for deserialization (accounts, cards, commands)
//! - Conversion from CSV rows to domain types
//! - Account balance and transaction history serialization
//!
//! Card lists are written as `NUMBER:UNITS` pairs joined by `;`, e.g.
//! `X001:3;X002:1`. Party ids use `0` for the system.
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{
    Account, Card, CardAmount, ExchangeRequest, Party, ReconciledTransaction, Role,
    TransactionGuid, TransactionStatus, TransferCardsRequest, TransferCashRequest, UserId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Accounts seed row: `user,role,cash,cards`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvAccount {
    pub user: UserId,
    pub role: Option<String>,
    pub cash: Option<String>,
    pub cards: Option<String>,
}

/// Card catalog seed row: `number,total,occupied`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvCard {
    pub number: String,
    pub total: u32,
    pub occupied: Option<u32>,
}

/// Command row
///
/// Columns: `op,actor,given_by,given_to,cash,cash_received,cards,cards_received,status,guid`.
/// Every column but `op` and `actor` is optional; which ones are required
/// depends on `op`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvCommand {
    pub op: String,
    pub actor: UserId,
    pub given_by: Option<String>,
    pub given_to: Option<String>,
    pub cash: Option<String>,
    pub cash_received: Option<String>,
    pub cards: Option<String>,
    pub cards_received: Option<String>,
    pub status: Option<String>,
    pub guid: Option<String>,
}

/// One engine call to replay
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TransferCash(TransferCashRequest),
    TransferCards(TransferCardsRequest),
    GiveCards {
        actor: UserId,
        given_to: UserId,
        cards: Vec<CardAmount>,
    },
    Exchange(ExchangeRequest),
    ExecuteExchange {
        actor: UserId,
        guid: TransactionGuid,
    },
    DeclineExchange {
        actor: UserId,
        guid: TransactionGuid,
    },
}

impl Command {
    /// Operation name as written in the `op` column
    pub fn op(&self) -> &'static str {
        match self {
            Command::TransferCash(_) => "transfer_cash",
            Command::TransferCards(_) => "transfer_cards",
            Command::GiveCards { .. } => "give_cards",
            Command::Exchange(_) => "exchange",
            Command::ExecuteExchange { .. } => "execute_exchange",
            Command::DeclineExchange { .. } => "decline_exchange",
        }
    }
}

/// Trimmed, non-empty content of an optional column
fn field(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_number<T: FromStr>(value: &Option<String>, column: &str) -> Result<Option<T>, String> {
    field(value)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| format!("Invalid {} '{}'", column, raw))
        })
        .transpose()
}

fn required<T>(value: Option<T>, column: &str, op: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("{} requires a {} column", op, column))
}

fn parse_cash(value: &Option<String>, column: &str) -> Result<Option<Decimal>, String> {
    field(value)
        .map(|raw| {
            Decimal::from_str(raw).map_err(|_| format!("Invalid {} '{}'", column, raw))
        })
        .transpose()
}

/// Parse a `NUMBER:UNITS;NUMBER:UNITS` card list
///
/// An empty string yields an empty list.
pub fn parse_card_list(raw: &str) -> Result<Vec<CardAmount>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (number, units) = entry
                .split_once(':')
                .ok_or_else(|| format!("Invalid card entry '{}', expected NUMBER:UNITS", entry))?;
            let number = number.trim();
            if number.is_empty() {
                return Err(format!("Invalid card entry '{}', missing card number", entry));
            }
            let units = units
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("Invalid units in card entry '{}'", entry))?;
            Ok(CardAmount::new(number, units))
        })
        .collect()
}

/// Inverse of [`parse_card_list`]
pub fn format_card_list(cards: &[CardAmount]) -> String {
    cards
        .iter()
        .map(|card| format!("{}:{}", card.card_number, card.amount))
        .collect::<Vec<_>>()
        .join(";")
}

fn card_column(value: &Option<String>) -> Result<Vec<CardAmount>, String> {
    field(value).map_or(Ok(Vec::new()), parse_card_list)
}

/// Convert an accounts seed row into an [`Account`]
pub fn convert_csv_account(row: CsvAccount) -> Result<Account, String> {
    let role = field(&row.role)
        .map(Role::from_str)
        .transpose()
        .map_err(|e| format!("{} for user {}", e, row.user))?
        .unwrap_or_default();
    let cash = parse_cash(&row.cash, "cash")?.unwrap_or(Decimal::ZERO);
    if cash < Decimal::ZERO {
        return Err(format!("User {} cannot start with negative cash", row.user));
    }

    let mut account = Account::new(row.user, role).with_cash(cash);
    for card in card_column(&row.cards)? {
        account
            .credit_card(&card.card_number, card.amount)
            .ok_or_else(|| format!("Card {} overflows for user {}", card.card_number, row.user))?;
    }
    Ok(account)
}

/// Convert a card catalog seed row into a [`Card`]
pub fn convert_csv_card(row: CsvCard) -> Result<Card, String> {
    let occupied = row.occupied.unwrap_or(0);
    if occupied > row.total {
        return Err(format!(
            "Card {} has {} occupied units out of {}",
            row.number, occupied, row.total
        ));
    }
    Ok(Card::new(row.number.trim(), row.total, occupied))
}

/// Convert a command row into a [`Command`]
///
/// # Returns
///
/// * `Ok(Command)` - Successfully converted command
/// * `Err(String)` - Unknown operation, malformed column or missing column
pub fn convert_csv_command(row: CsvCommand) -> Result<Command, String> {
    let op = row.op.trim().to_lowercase();
    let status = field(&row.status)
        .map(TransactionStatus::parse_lenient)
        .unwrap_or(TransactionStatus::Pending);
    let given_by = parse_number::<u32>(&row.given_by, "given_by")?;
    let given_to = parse_number::<UserId>(&row.given_to, "given_to")?;

    let command = match op.as_str() {
        "transfer_cash" => Command::TransferCash(TransferCashRequest {
            user_id: row.actor,
            given_by: Party::from(required(given_by, "given_by", &op)?),
            given_to: required(given_to, "given_to", &op)?,
            amount: required(parse_cash(&row.cash, "cash")?, "cash", &op)?,
            status,
        }),
        "transfer_cards" => Command::TransferCards(TransferCardsRequest {
            user_id: row.actor,
            given_by: Party::from(required(given_by, "given_by", &op)?),
            given_to: required(given_to, "given_to", &op)?,
            cards: card_column(&row.cards)?,
            status,
        }),
        "give_cards" => Command::GiveCards {
            actor: row.actor,
            given_to: required(given_to, "given_to", &op)?,
            cards: card_column(&row.cards)?,
        },
        "exchange" => {
            let given_by = given_by.unwrap_or(row.actor);
            if given_by != row.actor {
                return Err(format!(
                    "Exchange must be proposed by its sender (actor {}, given_by {})",
                    row.actor, given_by
                ));
            }
            Command::Exchange(ExchangeRequest {
                given_by,
                given_to: required(given_to, "given_to", &op)?,
                cash_sent: parse_cash(&row.cash, "cash")?.unwrap_or(Decimal::ZERO),
                cash_received: parse_cash(&row.cash_received, "cash_received")?
                    .unwrap_or(Decimal::ZERO),
                cards_sent: card_column(&row.cards)?,
                cards_received: card_column(&row.cards_received)?,
            })
        }
        "execute_exchange" => Command::ExecuteExchange {
            actor: row.actor,
            guid: required(parse_number(&row.guid, "guid")?, "guid", &op)?,
        },
        "decline_exchange" => Command::DeclineExchange {
            actor: row.actor,
            guid: required(parse_number(&row.guid, "guid")?, "guid", &op)?,
        },
        _ => return Err(format!("Invalid operation: '{}'", row.op)),
    };
    Ok(command)
}

/// Write account balances to CSV
///
/// Columns: `user,cash,cards`. Accounts are sorted by user id and each
/// account's cards by card number for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["user", "cash", "cards"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.user_id);

    for account in sorted_accounts {
        let mut cards: Vec<CardAmount> = account
            .cards
            .iter()
            .map(|holding| CardAmount::new(holding.card_number.clone(), holding.occupied))
            .collect();
        cards.sort_by(|a, b| a.card_number.cmp(&b.card_number));

        writer
            .write_record(&[
                account.user_id.to_string(),
                format!("{:.2}", account.cash),
                format_card_list(&cards),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write a reconciled history to CSV, in the order given
///
/// Columns: `guid,counterparty,cash_sent,cash_received,cards_sent,cards_received,status`
pub fn write_history_csv(
    transactions: &[ReconciledTransaction],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "guid",
            "counterparty",
            "cash_sent",
            "cash_received",
            "cards_sent",
            "cards_received",
            "status",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for transaction in transactions {
        writer
            .write_record(&[
                transaction.transaction_guid.to_string(),
                u32::from(transaction.counterparty).to_string(),
                format!("{:.2}", transaction.cash_sent),
                format!("{:.2}", transaction.cash_received),
                format_card_list(&transaction.cards_sent),
                format_card_list(&transaction.cards_received),
                transaction.status.to_string(),
            ])
            .map_err(|e| format!("Failed to write transaction record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn command(op: &str, actor: UserId, columns: &[(&str, &str)]) -> CsvCommand {
        let get = |name: &str| {
            columns
                .iter()
                .find(|(column, _)| *column == name)
                .map(|(_, value)| value.to_string())
        };
        CsvCommand {
            op: op.to_string(),
            actor,
            given_by: get("given_by"),
            given_to: get("given_to"),
            cash: get("cash"),
            cash_received: get("cash_received"),
            cards: get("cards"),
            cards_received: get("cards_received"),
            status: get("status"),
            guid: get("guid"),
        }
    }

    #[rstest]
    #[case::single("X001:3", vec![CardAmount::new("X001", 3)])]
    #[case::several(" X001:3 ; X002:1 ", vec![CardAmount::new("X001", 3), CardAmount::new("X002", 1)])]
    #[case::empty("", vec![])]
    #[case::trailing_separator("X001:3;", vec![CardAmount::new("X001", 3)])]
    fn test_parse_card_list(#[case] raw: &str, #[case] expected: Vec<CardAmount>) {
        assert_eq!(parse_card_list(raw).unwrap(), expected);
    }

    #[rstest]
    #[case::missing_units("X001")]
    #[case::negative_units("X001:-1")]
    #[case::missing_number(":3")]
    fn test_parse_card_list_errors(#[case] raw: &str) {
        assert!(parse_card_list(raw).is_err());
    }

    #[test]
    fn test_system_transfer_cash() {
        let row = command(
            "transfer_cash",
            1,
            &[("given_by", "0"), ("given_to", "42"), ("cash", "100.50"), ("status", "success")],
        );

        let converted = convert_csv_command(row).unwrap();

        assert_eq!(
            converted,
            Command::TransferCash(TransferCashRequest {
                user_id: 1,
                given_by: Party::System,
                given_to: 42,
                amount: Decimal::new(10050, 2),
                status: TransactionStatus::Success,
            })
        );
    }

    #[rstest]
    #[case::unknown_text("settled", TransactionStatus::Pending)]
    #[case::missing("", TransactionStatus::Pending)]
    #[case::failed("failed", TransactionStatus::Failed)]
    fn test_status_column(#[case] raw: &str, #[case] expected: TransactionStatus) {
        let row = command(
            "transfer_cards",
            42,
            &[("given_by", "42"), ("given_to", "43"), ("cards", "X001:1"), ("status", raw)],
        );

        match convert_csv_command(row).unwrap() {
            Command::TransferCards(request) => assert_eq!(request.status, expected),
            other => panic!("expected TransferCards, got {:?}", other),
        }
    }

    #[test]
    fn test_exchange_defaults_sender_to_actor() {
        let row = command(
            "exchange",
            7,
            &[("given_to", "8"), ("cards", "X001:2"), ("cash_received", "15")],
        );

        match convert_csv_command(row).unwrap() {
            Command::Exchange(request) => {
                assert_eq!(request.given_by, 7);
                assert_eq!(request.cash_sent, Decimal::ZERO);
                assert_eq!(request.cash_received, Decimal::from(15));
                assert_eq!(request.cards_sent, vec![CardAmount::new("X001", 2)]);
                assert!(request.cards_received.is_empty());
            }
            other => panic!("expected Exchange, got {:?}", other),
        }
    }

    #[rstest]
    #[case::unknown_op(command("refund", 1, &[]))]
    #[case::missing_receiver(command("transfer_cash", 1, &[("given_by", "1"), ("cash", "5")]))]
    #[case::missing_cash(command("transfer_cash", 1, &[("given_by", "1"), ("given_to", "2")]))]
    #[case::bad_cash(command("transfer_cash", 1, &[("given_by", "1"), ("given_to", "2"), ("cash", "abc")]))]
    #[case::missing_guid(command("execute_exchange", 1, &[]))]
    #[case::foreign_exchange(command("exchange", 1, &[("given_by", "2"), ("given_to", "3"), ("cash", "1")]))]
    fn test_command_errors(#[case] row: CsvCommand) {
        assert!(convert_csv_command(row).is_err());
    }

    #[rstest]
    #[case::execute("execute_exchange")]
    #[case::decline("DECLINE_EXCHANGE")]
    fn test_guid_commands(#[case] op: &str) {
        let converted = convert_csv_command(command(op, 8, &[("guid", "12")])).unwrap();
        assert_eq!(converted.op(), op.to_lowercase());
    }

    #[test]
    fn test_convert_account_seed() {
        let account = convert_csv_account(CsvAccount {
            user: 7,
            role: Some("admin".to_string()),
            cash: Some("12.5".to_string()),
            cards: Some("X001:2;X001:1".to_string()),
        })
        .unwrap();

        assert!(account.is_admin());
        assert_eq!(account.cash, Decimal::new(125, 1));
        assert_eq!(account.holding("X001"), 3);
        assert_eq!(account.cards.len(), 1);
    }

    #[test]
    fn test_convert_card_seed_rejects_overfull() {
        assert!(convert_csv_card(CsvCard {
            number: "X001".to_string(),
            total: 2,
            occupied: Some(3),
        })
        .is_err());
    }

    #[test]
    fn test_write_accounts_csv() {
        let accounts = vec![
            Account::new(8, Role::User).with_cash(Decimal::new(5, 1)),
            Account::new(7, Role::User)
                .with_cash(Decimal::from(100))
                .with_card("X002", 1)
                .with_card("X001", 4),
        ];
        let mut output = Vec::new();

        write_accounts_csv(&accounts, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,cash,cards\n7,100.00,X001:4;X002:1\n8,0.50,\n"
        );
    }

    #[test]
    fn test_write_history_csv() {
        let transactions = vec![ReconciledTransaction {
            transaction_guid: 3,
            cards_sent: vec![CardAmount::new("X001", 2)],
            cards_received: vec![],
            cash_sent: Decimal::ZERO,
            cash_received: Decimal::from(15),
            counterparty: Party::System,
            time: Utc::now(),
            status: TransactionStatus::Pending,
        }];
        let mut output = Vec::new();

        write_history_csv(&transactions, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "guid,counterparty,cash_sent,cash_received,cards_sent,cards_received,status\n\
             3,0,0.00,15.00,X001:2,,pending\n"
        );
    }
}
