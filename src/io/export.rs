use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Account, AccountId, AccountType, Amount, Currency, Transaction, format_amount,
};

/// Portable document describing one account and its full history.
///
/// Field names are stable: a document written by [`AccountExport::to_json`]
/// is read back by the importer without losing ids, timestamps or
/// balance snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountExport {
    /// Missing in hand-written files; the importer then assigns a fresh id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AccountId>,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub balance: Amount,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub interest_rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl AccountExport {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: Some(account.id),
            name: account.name.clone(),
            account_type: account.account_type,
            currency: account.currency,
            balance: account.balance(),
            last_updated: account.last_updated(),
            interest_rate: account.interest_rate(),
            exported_at: Some(Utc::now()),
            transactions: account.transactions().to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// File name used when exporting an account.
pub fn export_file_name(id: AccountId) -> String {
    format!("transactions-{}.json", id)
}

/// Write an account's transactions as a CSV statement.
/// Returns the number of rows written.
pub fn write_statement_csv<W: Write>(account: &Account, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "id",
        "timestamp",
        "type",
        "amount",
        "balance_after",
        "currency",
        "from_account",
        "to_account",
    ])?;

    let mut count = 0;
    for tx in account.transactions() {
        csv_writer.write_record([
            tx.id.to_string(),
            tx.timestamp.to_rfc3339(),
            tx.transaction_type.as_str().to_string(),
            format_amount(tx.amount),
            format_amount(tx.balance_after),
            tx.currency.as_str().to_string(),
            tx.from_account.map(|id| id.to_string()).unwrap_or_default(),
            tx.to_account.map(|id| id.to_string()).unwrap_or_default(),
        ])?;
        count += 1;
    }

    csv_writer.flush()?;
    Ok(count)
}
