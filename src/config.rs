use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Storage key holding the whole serialized account collection.
pub const ACCOUNTS_KEY: &str = "bankapp.accounts";

/// PIN used when none is configured.
pub const DEFAULT_PIN: &str = "1234";

/// Settings consumed by the account service.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Shared secret gating access; compared for equality only
    pub pin: String,
    /// Annual rate given to new savings accounts (0.02 = 2%)
    pub default_savings_rate: Decimal,
    /// Storage key for the account collection
    pub accounts_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pin: DEFAULT_PIN.to_string(),
            default_savings_rate: dec!(0.02),
            accounts_key: ACCOUNTS_KEY.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }
}

/// Timeout and retry behaviour for storage calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after every failure
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay
    pub max_delay: Duration,
    /// Hard limit for one attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Where the on-disk storage keeps its data and files.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Directory receiving exported files
    pub export_dir: PathBuf,
    /// File read by `import`, if any
    pub import_source: Option<PathBuf>,
}
