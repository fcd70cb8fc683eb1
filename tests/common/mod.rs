// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use bankbook::application::AccountService;
use bankbook::config::{LedgerConfig, StorageConfig};
use bankbook::domain::{Account, AccountType, Amount, Currency};
use bankbook::storage::{MemoryStorage, SqliteStorage, Storage};
use chrono::{DateTime, Utc};
use tempfile::TempDir;

/// Helper to create a service backed by in-process storage
pub fn test_service() -> (Arc<AccountService>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let service = AccountService::new(storage.clone(), LedgerConfig::default());
    (Arc::new(service), storage)
}

/// Helper to create a second service over the same storage (a "restart")
pub fn reopen(storage: &Arc<MemoryStorage>) -> AccountService {
    AccountService::new(storage.clone(), LedgerConfig::default())
}

/// Helper to create a service backed by a temporary SQLite database
pub async fn sqlite_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = StorageConfig {
        database_path: temp_dir.path().join("test.db"),
        export_dir: temp_dir.path().join("exports"),
        import_source: None,
    };
    let storage = SqliteStorage::init(&config).await?;
    let service = AccountService::new(Arc::new(storage), LedgerConfig::default());
    Ok((service, temp_dir))
}

/// Replace an account's stored state, e.g. to backdate its last update.
pub async fn rewrite_account(
    service: &AccountService,
    account: &Account,
    balance: Amount,
    last_updated: DateTime<Utc>,
) -> Result<Account> {
    let rewritten = Account::restore(
        account.id,
        account.name.clone(),
        account.account_type,
        account.currency,
        balance,
        last_updated,
        account.transactions().to_vec(),
    )
    .with_interest_rate(account.interest_rate());
    service.update_account(rewritten.clone()).await?;
    Ok(rewritten)
}

/// Test fixture: Standard account setup
pub struct StandardAccounts {
    pub savings: Account,
    pub checking: Account,
}

impl StandardAccounts {
    /// Savings (1000 SEK, 2%) and Checking (0 SEK)
    pub async fn create(service: &AccountService) -> Result<Self> {
        let savings = service
            .create_account(
                "Savings".into(),
                AccountType::Savings,
                Currency::Sek,
                Amount::from(1000),
            )
            .await?;
        let checking = service
            .create_account(
                "Checking".into(),
                AccountType::Deposit,
                Currency::Sek,
                Amount::ZERO,
            )
            .await?;
        Ok(Self { savings, checking })
    }
}

/// Storage whose writes can be switched to fail
pub struct FailingStorage {
    pub inner: MemoryStorage,
    pub fail_writes: AtomicBool,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.inner.set(key, value).await
    }

    async fn download_file(&self, name: &str, content: &str) -> Result<()> {
        self.inner.download_file(name, content).await
    }

    async fn read_file(&self) -> Result<String> {
        self.inner.read_file().await
    }
}
