use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tag::EnumTag;
use super::{AccountId, Amount, Currency};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumTag")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    TransferIn,
    TransferOut,
    Interest,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::TransferOut => "transfer_out",
            TransactionType::Interest => "interest",
        }
    }

    /// Accepts both the display form (`transfer_in`) and the variant name (`TransferIn`).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "").as_str() {
            "deposit" => Some(TransactionType::Deposit),
            "withdraw" => Some(TransactionType::Withdraw),
            "transferin" => Some(TransactionType::TransferIn),
            "transferout" => Some(TransactionType::TransferOut),
            "interest" => Some(TransactionType::Interest),
            _ => None,
        }
    }
}

impl TryFrom<EnumTag> for TransactionType {
    type Error = String;

    fn try_from(tag: EnumTag) -> Result<Self, Self::Error> {
        use TransactionType::*;
        tag.resolve(
            "transaction type",
            &[Deposit, Withdraw, TransferIn, TransferOut, Interest],
            Self::from_str,
        )
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single balance-affecting event recorded on one account.
/// Transactions are immutable; a transfer produces one record on each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    /// Account money left (withdrawals and outgoing/incoming transfer legs)
    pub from_account: Option<AccountId>,
    /// Account money arrived in (deposits, interest and transfer legs)
    pub to_account: Option<AccountId>,
    /// Signed amount: negative for withdrawals and outgoing transfers
    pub amount: Amount,
    /// Balance of the owning account right after this transaction
    #[serde(alias = "balanceAfterTransaction")]
    pub balance_after: Amount,
    pub currency: Currency,
    #[serde(alias = "timeStamp")]
    pub timestamp: DateTime<Utc>,
    pub transaction_type: TransactionType,
}

impl Transaction {
    pub(crate) fn record(
        transaction_type: TransactionType,
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        amount: Amount,
        balance_after: Amount,
        currency: Currency,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            amount,
            balance_after,
            currency,
            timestamp,
            transaction_type,
        }
    }

    /// Unsigned size of the movement
    pub fn magnitude(&self) -> Amount {
        self.amount.abs()
    }
}
