use thiserror::Error;
use uuid::Uuid;

use crate::domain::Account;
use crate::io::export::AccountExport;

/// Why an import payload was rejected
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("import file is empty")]
    Empty,

    #[error("import file is not a valid account export: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse an account export document.
pub fn parse_account_export(content: &str) -> Result<AccountExport, ImportError> {
    if content.trim().is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(serde_json::from_str(content)?)
}

impl AccountExport {
    /// Rebuild the account exactly as described by the document.
    ///
    /// Balances are not recomputed: the stored balance, timestamps and every
    /// transaction's balance snapshot are trusted as written.
    pub fn into_account(self) -> Account {
        Account::restore(
            self.id.unwrap_or_else(Uuid::new_v4),
            self.name,
            self.account_type,
            self.currency,
            self.balance,
            self.last_updated,
            self.transactions,
        )
        .with_interest_rate(self.interest_rate)
    }
}
