use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::config::LedgerConfig;
use crate::domain::{Account, AccountId, AccountType, Amount, Currency, Transaction};
use crate::io::{AccountExport, export_file_name, parse_account_export};
use crate::storage::Storage;

use super::LedgerError;

/// Owns the account collection and keeps it in sync with storage.
///
/// The collection is loaded once, either explicitly through [`open`] or on
/// the first operation that needs it. Every operation runs under a single
/// mutex, so user actions and background jobs never interleave. Mutations are
/// applied to a draft copy which is persisted before it replaces the live
/// collection: an operation either lands completely or not at all.
///
/// [`open`]: AccountService::open
pub struct AccountService {
    storage: Arc<dyn Storage>,
    config: LedgerConfig,
    accounts: Mutex<Option<Vec<Account>>>,
}

/// Result of a transfer between two accounts
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Amount,
    /// TransferOut leg recorded on the source account
    pub outgoing: Transaction,
    /// TransferIn leg recorded on the destination account
    pub incoming: Transaction,
}

/// Interest credited to one account during a batch
#[derive(Debug, Clone, PartialEq)]
pub struct InterestCredit {
    pub account_id: AccountId,
    pub amount: Amount,
    pub balance_after: Amount,
}

/// Account skipped during a batch because its accrual failed
#[derive(Debug, Clone, PartialEq)]
pub struct InterestFailure {
    pub account_id: AccountId,
    pub reason: String,
}

/// Outcome of applying interest to all savings accounts
#[derive(Debug, Clone, Default)]
pub struct InterestReport {
    pub credited: Vec<InterestCredit>,
    pub failed: Vec<InterestFailure>,
}

impl InterestReport {
    pub fn total_credited(&self) -> Amount {
        self.credited.iter().map(|c| c.amount).sum()
    }
}

/// Whether a mutation changed anything worth persisting
enum Change<T> {
    Applied(T),
    Unchanged(T),
}

impl AccountService {
    pub fn new(storage: Arc<dyn Storage>, config: LedgerConfig) -> Self {
        Self {
            storage,
            config,
            accounts: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ========================
    // Lifecycle
    // ========================

    /// Load the account collection from storage.
    /// Loading happens at most once; later calls only report the account count.
    pub async fn open(&self) -> Result<usize, LedgerError> {
        let accounts = self.lock_loaded().await?;
        Ok(accounts.len())
    }

    /// Persist the collection (if loaded) and drop it from memory.
    /// The next operation loads it again.
    pub async fn close(&self) -> Result<(), LedgerError> {
        let mut slot = self.accounts.lock().await;
        if let Some(accounts) = slot.as_ref() {
            self.persist(accounts).await?;
        }
        *slot = None;
        debug!("account service closed");
        Ok(())
    }

    pub async fn is_loaded(&self) -> bool {
        self.accounts.lock().await.is_some()
    }

    // ========================
    // Account operations
    // ========================

    /// Create a new account. Savings accounts get the configured default rate.
    pub async fn create_account(
        &self,
        name: String,
        account_type: AccountType,
        currency: Currency,
        initial_balance: Amount,
    ) -> Result<Account, LedgerError> {
        let rate = match account_type {
            AccountType::Savings => self.config.default_savings_rate,
            AccountType::Deposit => Decimal::ZERO,
        };
        self.create_account_with_rate(name, account_type, currency, initial_balance, rate)
            .await
    }

    /// Create a new account with an explicit annual interest rate.
    #[instrument(skip(self, name))]
    pub async fn create_account_with_rate(
        &self,
        name: String,
        account_type: AccountType,
        currency: Currency,
        initial_balance: Amount,
        interest_rate: Decimal,
    ) -> Result<Account, LedgerError> {
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "account name must not be empty".to_string(),
            ));
        }
        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "initial balance must not be negative, got {}",
                initial_balance
            )));
        }
        if interest_rate < Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "interest rate must not be negative, got {}",
                interest_rate
            )));
        }

        let account = Account::new(name, account_type, currency, initial_balance)
            .with_interest_rate(interest_rate);

        let created = self
            .mutate(|accounts| {
                accounts.push(account.clone());
                Ok(Change::Applied(account))
            })
            .await?;

        info!(account_id = %created.id, "account created");
        Ok(created)
    }

    /// Snapshot of every account, in creation order.
    pub async fn get_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.lock_loaded().await?.clone())
    }

    /// Get a single account by id.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let accounts = self.lock_loaded().await?;
        accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }

    /// Find an account by name (case-insensitive).
    pub async fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, LedgerError> {
        let accounts = self.lock_loaded().await?;
        Ok(accounts
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    /// Remove an account. Returns false (and writes nothing) if it did not exist.
    pub async fn delete_account(&self, id: AccountId) -> Result<bool, LedgerError> {
        let removed = self
            .mutate(|accounts| {
                let before = accounts.len();
                accounts.retain(|a| a.id != id);
                Ok(if accounts.len() < before {
                    Change::Applied(true)
                } else {
                    Change::Unchanged(false)
                })
            })
            .await?;

        if removed {
            info!(account_id = %id, "account deleted");
        } else {
            debug!(account_id = %id, "delete ignored: no such account");
        }
        Ok(removed)
    }

    /// Replace the stored account having the same id as `updated`.
    /// Returns false (and writes nothing) if there is no such account.
    pub async fn update_account(&self, updated: Account) -> Result<bool, LedgerError> {
        let id = updated.id;
        if updated.interest_rate() < Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "interest rate must not be negative, got {}",
                updated.interest_rate()
            )));
        }
        let replaced = self
            .mutate(|accounts| match accounts.iter_mut().find(|a| a.id == id) {
                Some(slot) => {
                    *slot = updated;
                    Ok(Change::Applied(true))
                }
                None => Ok(Change::Unchanged(false)),
            })
            .await?;

        if replaced {
            info!(account_id = %id, "account updated");
        }
        Ok(replaced)
    }

    // ========================
    // Money movements
    // ========================

    /// Move money between two accounts.
    ///
    /// Checks run in a fixed order so a request breaking several rules always
    /// reports the same error: source exists, destination exists, accounts
    /// differ, currencies match, source covers the amount, amount is positive.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt, LedgerError> {
        let receipt = self
            .mutate(|accounts| {
                let from = position(accounts, from_id)?;
                let to = position(accounts, to_id)?;
                if from == to {
                    return Err(LedgerError::InvalidArgument(
                        "cannot transfer to the same account".to_string(),
                    ));
                }

                let (source, target) = pair_mut(accounts, from, to);
                if source.currency != target.currency {
                    return Err(LedgerError::CurrencyMismatch {
                        from: source.currency,
                        to: target.currency,
                    });
                }
                if source.balance() < amount {
                    return Err(LedgerError::InsufficientFunds {
                        account_id: from_id,
                        balance: source.balance(),
                        requested: amount,
                    });
                }
                if amount <= Decimal::ZERO {
                    return Err(LedgerError::InvalidArgument(format!(
                        "amount must be positive, got {}",
                        amount
                    )));
                }

                let (outgoing, incoming) = source
                    .transfer_to(target, amount)
                    .map_err(|e| LedgerError::from_account(to_id, e))?;
                Ok(Change::Applied(TransferReceipt {
                    from_account: from_id,
                    to_account: to_id,
                    amount,
                    outgoing,
                    incoming,
                }))
            })
            .await?;

        info!("transfer recorded");
        Ok(receipt)
    }

    /// Deposit into a single account.
    #[instrument(skip(self))]
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction, LedgerError> {
        let tx = self
            .mutate(|accounts| {
                let index = position(accounts, account_id)?;
                let tx = accounts[index]
                    .deposit(amount)
                    .map_err(|e| LedgerError::from_account(account_id, e))?;
                Ok(Change::Applied(tx.clone()))
            })
            .await?;

        info!(balance_after = %tx.balance_after, "deposit recorded");
        Ok(tx)
    }

    /// Withdraw from a single account.
    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction, LedgerError> {
        let tx = self
            .mutate(|accounts| {
                let index = position(accounts, account_id)?;
                let tx = accounts[index]
                    .withdraw(amount)
                    .map_err(|e| LedgerError::from_account(account_id, e))?;
                Ok(Change::Applied(tx.clone()))
            })
            .await?;

        info!(balance_after = %tx.balance_after, "withdrawal recorded");
        Ok(tx)
    }

    // ========================
    // Interest
    // ========================

    /// Credit accrued interest to every savings account.
    pub async fn apply_interest_to_savings_accounts(
        &self,
    ) -> Result<InterestReport, LedgerError> {
        self.apply_interest_to_savings_accounts_at(Utc::now()).await
    }

    /// Credit interest accrued up to `now` to every savings account.
    ///
    /// A failing account is reported and skipped; the others are still
    /// credited. The collection is written once, and only if something was
    /// credited.
    #[instrument(skip(self))]
    pub async fn apply_interest_to_savings_accounts_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<InterestReport, LedgerError> {
        let report = self
            .mutate(|accounts| {
                let mut report = InterestReport::default();
                for account in accounts.iter_mut().filter(|a| a.is_savings()) {
                    match account.apply_interest_at(now) {
                        Ok(Some(amount)) => report.credited.push(InterestCredit {
                            account_id: account.id,
                            amount,
                            balance_after: account.balance(),
                        }),
                        Ok(None) => {}
                        Err(err) => {
                            warn!(account_id = %account.id, error = %err, "interest skipped");
                            report.failed.push(InterestFailure {
                                account_id: account.id,
                                reason: err.to_string(),
                            });
                        }
                    }
                }

                Ok(if report.credited.is_empty() {
                    Change::Unchanged(report)
                } else {
                    Change::Applied(report)
                })
            })
            .await?;

        if !report.credited.is_empty() {
            info!(
                accounts = report.credited.len(),
                total = %report.total_credited(),
                "interest credited"
            );
        }
        Ok(report)
    }

    // ========================
    // Access
    // ========================

    /// Compare `pin` with the configured shared secret.
    pub async fn validate_pin(&self, pin: &str) -> bool {
        let valid = pin == self.config.pin;
        if !valid {
            warn!("rejected PIN");
        }
        valid
    }

    // ========================
    // Export / import
    // ========================

    /// Export an account and its history through the storage's download hook.
    ///
    /// Returns the file name, or `None` (after logging) when the account does
    /// not exist.
    #[instrument(skip(self))]
    pub async fn export_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Option<String>, LedgerError> {
        let export = {
            let accounts = self.lock_loaded().await?;
            match accounts.iter().find(|a| a.id == account_id) {
                Some(account) => AccountExport::from_account(account),
                None => {
                    warn!("export skipped: account not found");
                    return Ok(None);
                }
            }
        };

        let name = export_file_name(account_id);
        self.storage.download_file(&name, &export.to_json()?).await?;

        info!(file = %name, transactions = export.transactions.len(), "account exported");
        Ok(Some(name))
    }

    /// Import an account from the storage's file hook.
    ///
    /// Unreadable, empty or malformed payloads, negative interest rates and
    /// accounts whose id is already present, are logged and yield `None`. Ids, timestamps and
    /// balance snapshots are kept exactly as written in the file.
    #[instrument(skip(self))]
    pub async fn import_transactions(&self) -> Result<Option<Account>, LedgerError> {
        let content = match self.storage.read_file().await {
            Ok(content) => content,
            Err(err) => {
                let reason = format!("{:#}", err);
                warn!(error = %reason, "import skipped: file could not be read");
                return Ok(None);
            }
        };

        let account = match parse_account_export(&content) {
            Ok(export) => export.into_account(),
            Err(err) => {
                warn!(error = %err, "import skipped");
                return Ok(None);
            }
        };
        if account.interest_rate() < Decimal::ZERO {
            warn!(rate = %account.interest_rate(), "import skipped: negative interest rate");
            return Ok(None);
        }

        let imported = self
            .mutate(|accounts| {
                if accounts.iter().any(|a| a.id == account.id) {
                    warn!(account_id = %account.id, "import skipped: account already exists");
                    return Ok(Change::Unchanged(None));
                }
                accounts.push(account.clone());
                Ok(Change::Applied(Some(account)))
            })
            .await?;

        if let Some(account) = &imported {
            info!(
                account_id = %account.id,
                transactions = account.transactions().len(),
                "account imported"
            );
        }
        Ok(imported)
    }

    // ========================
    // Internals
    // ========================

    /// Lock the collection, loading it from storage first if needed.
    async fn lock_loaded(&self) -> Result<MappedMutexGuard<'_, Vec<Account>>, LedgerError> {
        let mut slot = self.accounts.lock().await;
        if slot.is_none() {
            *slot = Some(self.load().await?);
        }
        Ok(MutexGuard::map(slot, |s| s.get_or_insert_with(Vec::new)))
    }

    /// Apply `change` to a draft of the collection, persist it, then commit.
    async fn mutate<T, F>(&self, change: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Vec<Account>) -> Result<Change<T>, LedgerError>,
    {
        let mut accounts = self.lock_loaded().await?;
        let mut draft = accounts.clone();

        match change(&mut draft)? {
            Change::Unchanged(value) => Ok(value),
            Change::Applied(value) => {
                self.persist(&draft).await?;
                *accounts = draft;
                Ok(value)
            }
        }
    }

    async fn load(&self) -> Result<Vec<Account>, LedgerError> {
        let raw = self.storage.get(&self.config.accounts_key).await?;
        let accounts: Vec<Account> = match raw.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Vec::new(),
            Some(json) => serde_json::from_str(json)?,
        };

        info!(count = accounts.len(), "accounts loaded");
        Ok(accounts)
    }

    async fn persist(&self, accounts: &[Account]) -> Result<(), LedgerError> {
        let json = serde_json::to_string(accounts)?;
        self.storage.set(&self.config.accounts_key, &json).await?;
        debug!(count = accounts.len(), "accounts persisted");
        Ok(())
    }
}

fn position(accounts: &[Account], id: AccountId) -> Result<usize, LedgerError> {
    accounts
        .iter()
        .position(|a| a.id == id)
        .ok_or(LedgerError::NotFound(id))
}

/// Borrow two distinct accounts mutably. `a` and `b` must differ.
fn pair_mut(accounts: &mut [Account], a: usize, b: usize) -> (&mut Account, &mut Account) {
    if a < b {
        let (left, right) = accounts.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = accounts.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
