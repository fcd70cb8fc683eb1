use thiserror::Error;

use crate::domain::{AccountError, AccountId, Amount, Currency};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Amount,
        requested: Amount,
    },

    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error("Currency mismatch between accounts: {from} vs {to}")]
    CurrencyMismatch { from: Currency, to: Currency },

    #[error("Malformed ledger data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// Lift an account rule violation into the ledger taxonomy.
    pub fn from_account(account_id: AccountId, err: AccountError) -> Self {
        match err {
            AccountError::NonPositiveAmount(amount) => {
                LedgerError::InvalidArgument(format!("amount must be positive, got {}", amount))
            }
            AccountError::InsufficientFunds { balance, requested } => {
                LedgerError::InsufficientFunds {
                    account_id,
                    balance,
                    requested,
                }
            }
            AccountError::NegativeRate(rate) => LedgerError::InvalidArgument(format!(
                "interest rate of account {} must not be negative, got {}",
                account_id, rate
            )),
            AccountError::Overflow(what) => LedgerError::Arithmetic(format!(
                "overflow while {} on account {}",
                what, account_id
            )),
        }
    }
}
