use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::tag::EnumTag;
use super::{Amount, Currency, Transaction, TransactionType, round_money};

pub type AccountId = Uuid;

const DAYS_PER_YEAR: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumTag")]
pub enum AccountType {
    /// Earns interest at the account's annual rate
    Savings,
    /// Plain transactional account, never earns interest
    Deposit,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Deposit => "deposit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "savings" => Some(AccountType::Savings),
            "deposit" => Some(AccountType::Deposit),
            _ => None,
        }
    }
}

impl TryFrom<EnumTag> for AccountType {
    type Error = String;

    fn try_from(tag: EnumTag) -> Result<Self, Self::Error> {
        tag.resolve(
            "account type",
            &[AccountType::Savings, AccountType::Deposit],
            Self::from_str,
        )
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by the account's own balance rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("Interest rate must not be negative, got {0}")]
    NegativeRate(Decimal),

    #[error("Arithmetic overflow while {0}")]
    Overflow(&'static str),
}

/// A bank account and its full transaction history.
///
/// The balance always equals the opening balance plus the signed sum of
/// all recorded transactions. It only changes through the methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Currency,
    balance: Amount,
    last_updated: DateTime<Utc>,
    /// Annual rate as a fraction (0.02 = 2%)
    #[serde(default)]
    interest_rate: Decimal,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl Account {
    pub fn new(
        name: String,
        account_type: AccountType,
        currency: Currency,
        initial_balance: Amount,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            account_type,
            currency,
            balance: initial_balance,
            last_updated: Utc::now(),
            interest_rate: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }

    /// Rebuild an account from stored or imported data.
    /// Nothing is recomputed: id, balance, timestamp and history are taken as given.
    pub fn restore(
        id: AccountId,
        name: String,
        account_type: AccountType,
        currency: Currency,
        balance: Amount,
        last_updated: DateTime<Utc>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            id,
            name,
            account_type,
            currency,
            balance,
            last_updated,
            interest_rate: Decimal::ZERO,
            transactions,
        }
    }

    pub fn with_interest_rate(mut self, rate: Decimal) -> Self {
        self.interest_rate = rate;
        self
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn is_savings(&self) -> bool {
        self.account_type == AccountType::Savings
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_interest_rate(&mut self, rate: Decimal) {
        self.interest_rate = rate;
    }

    /// Balance before the first recorded transaction.
    pub fn opening_balance(&self) -> Amount {
        self.balance - self.transactions.iter().map(|t| t.amount).sum::<Amount>()
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<&Transaction, AccountError> {
        self.deposit_at(amount, Utc::now())
    }

    pub fn deposit_at(
        &mut self,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<&Transaction, AccountError> {
        ensure_positive(amount)?;
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::Overflow("depositing"))?;

        self.balance = balance;
        self.last_updated = now;
        Ok(self.push(Transaction::record(
            TransactionType::Deposit,
            None,
            Some(self.id),
            amount,
            balance,
            self.currency,
            now,
        )))
    }

    pub fn withdraw(&mut self, amount: Amount) -> Result<&Transaction, AccountError> {
        self.withdraw_at(amount, Utc::now())
    }

    pub fn withdraw_at(
        &mut self,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<&Transaction, AccountError> {
        ensure_positive(amount)?;
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }

        self.balance -= amount;
        self.last_updated = now;
        Ok(self.push(Transaction::record(
            TransactionType::Withdraw,
            Some(self.id),
            None,
            -amount,
            self.balance,
            self.currency,
            now,
        )))
    }

    /// Move `amount` to `other`, recording one leg on each side.
    ///
    /// Sign, funds and currency are the caller's to check. Only arithmetic
    /// overflow is rejected here, before either side changes.
    /// Returns copies of the (outgoing, incoming) legs.
    pub fn transfer_to(
        &mut self,
        other: &mut Account,
        amount: Amount,
    ) -> Result<(Transaction, Transaction), AccountError> {
        let source_balance = self
            .balance
            .checked_sub(amount)
            .ok_or(AccountError::Overflow("debiting a transfer"))?;
        let target_balance = other
            .balance
            .checked_add(amount)
            .ok_or(AccountError::Overflow("crediting a transfer"))?;
        let now = Utc::now();

        self.balance = source_balance;
        self.last_updated = now;
        other.balance = target_balance;
        other.last_updated = now;

        let (from, to) = (Some(self.id), Some(other.id));
        let outgoing = self
            .push(Transaction::record(
                TransactionType::TransferOut,
                from,
                to,
                -amount,
                self.balance,
                self.currency,
                now,
            ))
            .clone();
        let incoming = other
            .push(Transaction::record(
                TransactionType::TransferIn,
                from,
                to,
                amount,
                other.balance,
                other.currency,
                now,
            ))
            .clone();
        Ok((outgoing, incoming))
    }

    pub fn apply_interest(&mut self) -> Result<Option<Amount>, AccountError> {
        self.apply_interest_at(Utc::now())
    }

    /// Credit interest accrued since the last update.
    ///
    /// Accrual is `balance * rate * whole_days / 365`, rounded half away from
    /// zero to cents. Returns the credited amount, or `None` when nothing was
    /// due (not a savings account, no full day elapsed, or a zero accrual).
    /// A negative rate is refused, so interest never debits the account.
    pub fn apply_interest_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<Amount>, AccountError> {
        if !self.is_savings() {
            return Ok(None);
        }

        let days = (now - self.last_updated).num_days();
        if days <= 0 {
            return Ok(None);
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(AccountError::NegativeRate(self.interest_rate));
        }

        let accrual = self
            .balance
            .checked_mul(self.interest_rate)
            .and_then(|v| v.checked_mul(Decimal::from(days)))
            .and_then(|v| v.checked_div(Decimal::from(DAYS_PER_YEAR)))
            .ok_or(AccountError::Overflow("computing interest"))?;
        let accrual = round_money(accrual);
        if accrual.is_zero() {
            return Ok(None);
        }

        self.balance = self
            .balance
            .checked_add(accrual)
            .ok_or(AccountError::Overflow("crediting interest"))?;
        self.last_updated = now;
        self.push(Transaction::record(
            TransactionType::Interest,
            None,
            Some(self.id),
            accrual,
            self.balance,
            self.currency,
            now,
        ));
        Ok(Some(accrual))
    }

    fn push(&mut self, transaction: Transaction) -> &Transaction {
        self.transactions.push(transaction);
        &self.transactions[self.transactions.len() - 1]
    }
}

fn ensure_positive(amount: Amount) -> Result<(), AccountError> {
    if amount <= Decimal::ZERO {
        return Err(AccountError::NonPositiveAmount(amount));
    }
    Ok(())
}
