use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::{AccountService, InterestScheduler};
use crate::config::{DEFAULT_PIN, LedgerConfig, RetryPolicy, StorageConfig};
use crate::domain::{Account, AccountType, Amount, Currency, format_amount, parse_amount};
use crate::io::write_statement_csv;
use crate::storage::{RetryingStorage, SqliteStorage};

/// Bankbook - personal bank accounts in a single file
#[derive(Parser)]
#[command(name = "bankbook")]
#[command(about = "Manage bank accounts, transfers and savings interest")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "BANKBOOK_DATABASE", default_value = "bankbook.db")]
    pub database: PathBuf,

    /// Directory receiving exported files
    #[arg(long, env = "BANKBOOK_EXPORT_DIR", default_value = ".")]
    pub export_dir: PathBuf,

    /// PIN unlocking the ledger
    #[arg(short, long, env = "BANKBOOK_PIN", global = true)]
    pub pin: Option<String>,

    /// Shared secret the PIN is checked against
    #[arg(long, env = "BANKBOOK_PIN_SECRET", default_value = DEFAULT_PIN, hide = true)]
    pub pin_secret: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the PIN without doing anything else
    Unlock,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Deposit money into an account
    Deposit {
        /// Account name or id
        account: String,

        /// Amount to deposit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account name or id
        account: String,

        /// Amount to withdraw
        amount: String,
    },

    /// Transfer money between two accounts
    Transfer {
        /// Amount to transfer
        amount: String,

        /// Source account name or id
        #[arg(long)]
        from: String,

        /// Destination account name or id
        #[arg(long)]
        to: String,
    },

    /// List an account's transactions
    History {
        /// Account name or id
        account: String,
    },

    /// Savings interest commands
    #[command(subcommand)]
    Interest(InterestCommands),

    /// Export an account with its transactions
    Export {
        /// Account name or id
        account: String,

        /// Write a CSV statement instead of the JSON document
        #[arg(long)]
        csv: bool,

        /// CSV output file (defaults to stdout)
        #[arg(short, long, requires = "csv")]
        output: Option<PathBuf>,
    },

    /// Import an account from a JSON export
    Import {
        /// File produced by `export`
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account name
        name: String,

        /// Account type: savings, deposit
        #[arg(short = 't', long = "type", default_value = "deposit")]
        account_type: String,

        /// Currency: SEK, EUR, USD
        #[arg(short, long, default_value = "SEK")]
        currency: String,

        /// Opening balance
        #[arg(short, long, default_value = "0")]
        balance: String,

        /// Annual interest rate as a fraction (savings only, e.g. 0.02)
        #[arg(short, long)]
        rate: Option<String>,
    },

    /// List all accounts
    List,

    /// Show account details
    Show {
        /// Account name or id
        account: String,
    },

    /// Rename an account
    Rename {
        /// Account name or id
        account: String,

        /// New name
        name: String,
    },

    /// Change the annual interest rate of an account
    SetRate {
        /// Account name or id
        account: String,

        /// Annual rate as a fraction (e.g. 0.025)
        rate: String,
    },

    /// Delete an account and its history
    Delete {
        /// Account name or id
        account: String,
    },
}

#[derive(Subcommand)]
pub enum InterestCommands {
    /// Credit interest accrued since the last update
    Apply,

    /// Keep crediting interest on a fixed interval until Ctrl+C
    Watch {
        /// Interval in seconds
        #[arg(long, default_value = "60")]
        every: u64,
    },
}

impl Cli {
    async fn open_service(&self, import_source: Option<PathBuf>) -> Result<Arc<AccountService>> {
        let storage_config = StorageConfig {
            database_path: self.database.clone(),
            export_dir: self.export_dir.clone(),
            import_source,
        };
        let storage = SqliteStorage::init(&storage_config).await?;
        let storage = RetryingStorage::new(storage, RetryPolicy::default());

        let config = LedgerConfig::default().with_pin(self.pin_secret.clone());
        let service = AccountService::new(Arc::new(storage), config);
        service.open().await?;
        Ok(Arc::new(service))
    }

    async fn unlock(&self, service: &AccountService) -> Result<()> {
        let pin = self
            .pin
            .as_deref()
            .context("PIN required (use --pin or BANKBOOK_PIN)")?;
        if !service.validate_pin(pin).await {
            anyhow::bail!("Invalid PIN");
        }
        Ok(())
    }

    pub async fn run(self) -> Result<()> {
        let import_source = match &self.command {
            Commands::Import { file } => Some(file.clone()),
            _ => None,
        };
        let service = self.open_service(import_source).await?;
        self.unlock(&service).await?;

        match self.command {
            Commands::Unlock => {
                println!("Unlocked");
            }

            Commands::Account(account_cmd) => {
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Deposit { account, amount } => {
                let account = resolve_account(&service, &account).await?;
                let tx = service.deposit(account.id, parse_money(&amount)?).await?;
                println!(
                    "Deposited {} {} into {} (balance {})",
                    format_amount(tx.amount),
                    tx.currency,
                    account.name,
                    format_amount(tx.balance_after)
                );
            }

            Commands::Withdraw { account, amount } => {
                let account = resolve_account(&service, &account).await?;
                let tx = service.withdraw(account.id, parse_money(&amount)?).await?;
                println!(
                    "Withdrew {} {} from {} (balance {})",
                    format_amount(tx.magnitude()),
                    tx.currency,
                    account.name,
                    format_amount(tx.balance_after)
                );
            }

            Commands::Transfer { amount, from, to } => {
                let from = resolve_account(&service, &from).await?;
                let to = resolve_account(&service, &to).await?;
                let receipt = service
                    .transfer(from.id, to.id, parse_money(&amount)?)
                    .await?;
                println!(
                    "Transferred {} {}: {} -> {}",
                    format_amount(receipt.amount),
                    receipt.outgoing.currency,
                    from.name,
                    to.name
                );
                println!(
                    "  {}: {}   {}: {}",
                    from.name,
                    format_amount(receipt.outgoing.balance_after),
                    to.name,
                    format_amount(receipt.incoming.balance_after)
                );
            }

            Commands::History { account } => {
                let account = resolve_account(&service, &account).await?;
                print_history(&account);
            }

            Commands::Interest(interest_cmd) => {
                run_interest_command(Arc::clone(&service), interest_cmd).await?;
            }

            Commands::Export {
                account,
                csv,
                output,
            } => {
                let account = resolve_account(&service, &account).await?;
                if csv {
                    let count = match &output {
                        Some(path) => {
                            let file = std::fs::File::create(path).with_context(|| {
                                format!("Failed to create output file: {}", path.display())
                            })?;
                            write_statement_csv(&account, file)?
                        }
                        None => write_statement_csv(&account, std::io::stdout())?,
                    };
                    if output.is_some() {
                        eprintln!("Exported {} transactions", count);
                    }
                } else if let Some(name) = service.export_transactions(account.id).await? {
                    println!(
                        "Exported {} to {}",
                        account.name,
                        self.export_dir.join(name).display()
                    );
                }
            }

            Commands::Import { file } => match service.import_transactions().await? {
                Some(account) => println!(
                    "Imported {} ({}) with {} transactions, balance {}",
                    account.name,
                    account.id,
                    account.transactions().len(),
                    format_amount(account.balance())
                ),
                None => {
                    anyhow::bail!("Nothing imported from {}", file.display());
                }
            },
        }

        service.close().await?;
        Ok(())
    }
}

async fn run_account_command(service: &AccountService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            name,
            account_type,
            currency,
            balance,
            rate,
        } => {
            let account_type = AccountType::from_str(&account_type).with_context(|| {
                format!(
                    "Invalid account type '{}'. Valid types: savings, deposit",
                    account_type
                )
            })?;
            let currency = Currency::from_str(&currency).with_context(|| {
                format!("Invalid currency '{}'. Valid: SEK, EUR, USD", currency)
            })?;
            let balance = parse_money(&balance)?;

            let account = match rate {
                Some(rate) => {
                    service
                        .create_account_with_rate(
                            name,
                            account_type,
                            currency,
                            balance,
                            parse_rate(&rate)?,
                        )
                        .await?
                }
                None => {
                    service
                        .create_account(name, account_type, currency, balance)
                        .await?
                }
            };
            println!(
                "Created account: {} ({}, {})",
                account.name, account.account_type, account.currency
            );
            println!("  ID: {}", account.id);
        }

        AccountCommands::List => {
            let accounts = service.get_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<20} {:<8} {:<8} {:>14}",
                    "NAME", "TYPE", "CURRENCY", "BALANCE"
                );
                println!("{}", "-".repeat(53));
                for account in &accounts {
                    println!(
                        "{:<20} {:<8} {:<8} {:>14}",
                        account.name,
                        account.account_type.as_str(),
                        account.currency.as_str(),
                        format_amount(account.balance())
                    );
                }
            }
        }

        AccountCommands::Show { account } => {
            let account = resolve_account(service, &account).await?;
            println!("Account: {}", account.name);
            println!("  ID:            {}", account.id);
            println!("  Type:          {}", account.account_type);
            println!("  Currency:      {}", account.currency);
            println!("  Balance:       {}", format_amount(account.balance()));
            if account.is_savings() {
                println!("  Interest rate: {}", account.interest_rate());
            }
            println!(
                "  Last updated:  {}",
                account.last_updated().format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Transactions:  {}", account.transactions().len());
        }

        AccountCommands::Rename { account, name } => {
            let mut account = resolve_account(service, &account).await?;
            let old_name = account.name.clone();
            account.rename(name);
            service.update_account(account.clone()).await?;
            println!("Renamed account: {} -> {}", old_name, account.name);
        }

        AccountCommands::SetRate { account, rate } => {
            let mut account = resolve_account(service, &account).await?;
            account.set_interest_rate(parse_rate(&rate)?);
            service.update_account(account.clone()).await?;
            println!(
                "Interest rate of {} set to {}",
                account.name,
                account.interest_rate()
            );
        }

        AccountCommands::Delete { account } => {
            let account = resolve_account(service, &account).await?;
            service.delete_account(account.id).await?;
            println!("Deleted account: {}", account.name);
        }
    }
    Ok(())
}

async fn run_interest_command(service: Arc<AccountService>, cmd: InterestCommands) -> Result<()> {
    match cmd {
        InterestCommands::Apply => {
            let report = service.apply_interest_to_savings_accounts().await?;
            if report.credited.is_empty() {
                println!("No interest due.");
            }
            for credit in &report.credited {
                let account = service.get_account(credit.account_id).await?;
                println!(
                    "  {:<20} +{:>12}  (balance {})",
                    account.name,
                    format_amount(credit.amount),
                    format_amount(credit.balance_after)
                );
            }
            for failure in &report.failed {
                eprintln!("  {}: {}", failure.account_id, failure.reason);
            }
        }

        InterestCommands::Watch { every } => {
            let scheduler =
                InterestScheduler::start(Arc::clone(&service), Duration::from_secs(every));
            println!("Applying interest every {}s, press Ctrl+C to stop", every);

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;

            let runs = scheduler.runs();
            scheduler.stop().await;
            println!("Stopped after {} run(s)", runs);
        }
    }
    Ok(())
}

fn print_history(account: &Account) {
    println!("{} ({})", account.name, account.currency);
    if account.transactions().is_empty() {
        println!("No transactions.");
        return;
    }

    println!(
        "{:<19} {:<13} {:>12} {:>14}",
        "DATE", "TYPE", "AMOUNT", "BALANCE"
    );
    println!("{}", "-".repeat(61));
    for tx in account.transactions() {
        println!(
            "{:<19} {:<13} {:>12} {:>14}",
            tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.transaction_type.as_str(),
            format_amount(tx.amount),
            format_amount(tx.balance_after)
        );
    }
}

/// Look an account up by id first, then by name.
async fn resolve_account(service: &AccountService, reference: &str) -> Result<Account> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(service.get_account(id).await?);
    }
    service
        .find_account_by_name(reference)
        .await?
        .with_context(|| format!("Account not found: {}", reference))
}

fn parse_money(input: &str) -> Result<Amount> {
    parse_amount(input).with_context(|| format!("Invalid amount: {}", input))
}

fn parse_rate(input: &str) -> Result<Decimal> {
    Decimal::from_str(input.trim()).with_context(|| format!("Invalid interest rate: {}", input))
}
