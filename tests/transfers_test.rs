mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bankbook::application::{AccountService, InterestScheduler, LedgerError};
use bankbook::config::LedgerConfig;
use bankbook::domain::{AccountType, Amount, Currency, TransactionType};
use chrono::{Duration as ChronoDuration, Utc};
use common::{FailingStorage, StandardAccounts, reopen, rewrite_account, test_service};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::task::JoinSet;
use uuid::Uuid;

#[tokio::test]
async fn test_transfer_moves_money_and_records_both_legs() -> Result<()> {
    let (service, _storage) = test_service();
    let a = service
        .create_account("A".into(), AccountType::Deposit, Currency::Sek, dec!(1000))
        .await?;
    let b = service
        .create_account("B".into(), AccountType::Deposit, Currency::Sek, dec!(0))
        .await?;

    let receipt = service.transfer(a.id, b.id, dec!(200)).await?;

    let a = service.get_account(a.id).await?;
    let b = service.get_account(b.id).await?;
    assert_eq!(a.balance(), dec!(800));
    assert_eq!(b.balance(), dec!(200));

    let out = &a.transactions()[0];
    assert_eq!(out.transaction_type, TransactionType::TransferOut);
    assert_eq!(out.amount, dec!(-200));
    assert_eq!(out.balance_after, dec!(800));
    assert_eq!(out.from_account, Some(a.id));
    assert_eq!(out.to_account, Some(b.id));

    let inc = &b.transactions()[0];
    assert_eq!(inc.transaction_type, TransactionType::TransferIn);
    assert_eq!(inc.amount, dec!(200));
    assert_eq!(inc.balance_after, dec!(200));
    assert_eq!(inc.from_account, Some(a.id));
    assert_eq!(inc.to_account, Some(b.id));

    assert_eq!(&receipt.outgoing, out);
    assert_eq!(&receipt.incoming, inc);
    assert_eq!(out.timestamp, inc.timestamp);
    Ok(())
}

#[tokio::test]
async fn test_transfers_conserve_money() -> Result<()> {
    let (service, _storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;
    let (s, c) = (fixture.savings.id, fixture.checking.id);

    service.transfer(s, c, dec!(333.33)).await?;
    service.transfer(c, s, dec!(100.01)).await?;
    service.transfer(s, c, dec!(0.01)).await?;

    let savings = service.get_account(s).await?;
    let checking = service.get_account(c).await?;
    assert_eq!(savings.balance(), dec!(766.67));
    assert_eq!(checking.balance(), dec!(233.33));
    assert_eq!(savings.balance() + checking.balance(), dec!(1000));

    assert_eq!(savings.opening_balance(), dec!(1000));
    assert_eq!(checking.opening_balance(), dec!(0));
    assert_eq!(savings.transactions().len(), 3);
    assert_eq!(checking.transactions().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_transfer_can_empty_the_source() -> Result<()> {
    let (service, _storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;

    service
        .transfer(fixture.savings.id, fixture.checking.id, dec!(1000))
        .await?;

    let savings = service.get_account(fixture.savings.id).await?;
    assert_eq!(savings.balance(), dec!(0));
    Ok(())
}

#[tokio::test]
async fn test_transfer_reports_missing_source_first() -> Result<()> {
    let (service, _storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;
    let ghost = Uuid::new_v4();

    // Both ids unknown: the source is reported.
    let other_ghost = Uuid::new_v4();
    let result = service.transfer(ghost, other_ghost, dec!(-5)).await;
    assert!(matches!(result, Err(LedgerError::NotFound(id)) if id == ghost));

    let result = service.transfer(fixture.savings.id, ghost, dec!(10)).await;
    assert!(matches!(result, Err(LedgerError::NotFound(id)) if id == ghost));
    Ok(())
}

#[tokio::test]
async fn test_transfer_to_same_account_is_rejected() -> Result<()> {
    let (service, storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;
    let writes = storage.write_count();

    let id = fixture.savings.id;
    let result = service.transfer(id, id, dec!(5000)).await;

    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    assert_eq!(storage.write_count(), writes);
    assert_eq!(service.get_account(id).await?.balance(), dec!(1000));
    Ok(())
}

#[tokio::test]
async fn test_transfer_between_currencies_is_rejected() -> Result<()> {
    let (service, _storage) = test_service();
    let sek = service
        .create_account("Kronor".into(), AccountType::Deposit, Currency::Sek, dec!(10))
        .await?;
    let eur = service
        .create_account("Euro".into(), AccountType::Deposit, Currency::Eur, dec!(10))
        .await?;

    // Currency is checked before funds.
    let result = service.transfer(sek.id, eur.id, dec!(500)).await;
    assert!(matches!(
        result,
        Err(LedgerError::CurrencyMismatch {
            from: Currency::Sek,
            to: Currency::Eur
        })
    ));

    assert_eq!(service.get_account(sek.id).await?.balance(), dec!(10));
    assert_eq!(service.get_account(eur.id).await?.balance(), dec!(10));
    Ok(())
}

#[tokio::test]
async fn test_transfer_insufficient_funds() -> Result<()> {
    let (service, storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;
    let writes = storage.write_count();

    let result = service
        .transfer(fixture.checking.id, fixture.savings.id, dec!(0.01))
        .await;

    match result {
        Err(LedgerError::InsufficientFunds {
            account_id,
            balance,
            requested,
        }) => {
            assert_eq!(account_id, fixture.checking.id);
            assert_eq!(balance, dec!(0));
            assert_eq!(requested, dec!(0.01));
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
    assert_eq!(storage.write_count(), writes);
    Ok(())
}

#[tokio::test]
async fn test_transfer_overflow_is_an_error() -> Result<()> {
    let (service, storage) = test_service();
    let a = service
        .create_account("A".into(), AccountType::Deposit, Currency::Sek, Decimal::MAX)
        .await?;
    let b = service
        .create_account("B".into(), AccountType::Deposit, Currency::Sek, Decimal::MAX)
        .await?;
    let writes = storage.write_count();

    let result = service.transfer(a.id, b.id, dec!(1)).await;

    assert!(matches!(result, Err(LedgerError::Arithmetic(_))));
    assert_eq!(storage.write_count(), writes);
    let a = service.get_account(a.id).await?;
    let b = service.get_account(b.id).await?;
    assert_eq!(a.balance(), Decimal::MAX);
    assert_eq!(b.balance(), Decimal::MAX);
    assert!(a.transactions().is_empty());
    assert!(b.transactions().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_transfer_rejects_non_positive_amounts() -> Result<()> {
    let (service, _storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;
    let (s, c) = (fixture.savings.id, fixture.checking.id);

    let zero = service.transfer(s, c, dec!(0)).await;
    assert!(matches!(zero, Err(LedgerError::InvalidArgument(_))));

    let negative = service.transfer(s, c, dec!(-50)).await;
    assert!(matches!(negative, Err(LedgerError::InvalidArgument(_))));

    // From an empty account, zero passes the funds check and fails on sign.
    let from_empty = service.transfer(c, s, dec!(0)).await;
    assert!(matches!(from_empty, Err(LedgerError::InvalidArgument(_))));

    let accounts = service.get_accounts().await?;
    assert!(accounts.iter().all(|a| a.transactions().is_empty()));
    Ok(())
}

#[tokio::test]
async fn test_transfer_survives_restart() -> Result<()> {
    let (service, storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;

    service
        .transfer(fixture.savings.id, fixture.checking.id, dec!(250))
        .await?;

    let restarted = reopen(&storage);
    let checking = restarted.get_account(fixture.checking.id).await?;
    assert_eq!(checking.balance(), dec!(250));
    assert_eq!(checking.transactions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_deposit_and_withdraw() -> Result<()> {
    let (service, storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;
    let id = fixture.checking.id;

    let deposit = service.deposit(id, dec!(100)).await?;
    assert_eq!(deposit.transaction_type, TransactionType::Deposit);
    assert_eq!(deposit.amount, dec!(100));
    assert_eq!(deposit.to_account, Some(id));
    assert_eq!(deposit.from_account, None);

    let withdrawal = service.withdraw(id, dec!(30)).await?;
    assert_eq!(withdrawal.transaction_type, TransactionType::Withdraw);
    assert_eq!(withdrawal.amount, dec!(-30));
    assert_eq!(withdrawal.balance_after, dec!(70));
    assert_eq!(withdrawal.from_account, Some(id));

    let account = service.get_account(id).await?;
    assert_eq!(account.balance(), dec!(70));
    assert_eq!(account.transactions().len(), 2);

    let restarted = reopen(&storage);
    assert_eq!(restarted.get_account(id).await?, account);
    Ok(())
}

#[tokio::test]
async fn test_withdraw_more_than_balance() -> Result<()> {
    let (service, storage) = test_service();
    let account = service
        .create_account("Wallet".into(), AccountType::Deposit, Currency::Sek, dec!(30))
        .await?;
    let writes = storage.write_count();

    let result = service.withdraw(account.id, dec!(50)).await;

    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    let unchanged = service.get_account(account.id).await?;
    assert_eq!(unchanged.balance(), dec!(30));
    assert!(unchanged.transactions().is_empty());
    assert_eq!(storage.write_count(), writes);
    Ok(())
}

#[tokio::test]
async fn test_deposit_rejects_non_positive_amount() -> Result<()> {
    let (service, _storage) = test_service();
    let fixture = StandardAccounts::create(&service).await?;

    let result = service.deposit(fixture.checking.id, dec!(0)).await;
    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));

    let result = service.withdraw(fixture.savings.id, dec!(-1)).await;
    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
    Ok(())
}

#[tokio::test]
async fn test_money_movements_on_missing_account() -> Result<()> {
    let (service, _storage) = test_service();
    let ghost = Uuid::new_v4();

    assert!(matches!(
        service.deposit(ghost, dec!(1)).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        service.withdraw(ghost, dec!(1)).await,
        Err(LedgerError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_failed_write_leaves_memory_untouched() -> Result<()> {
    let storage = Arc::new(FailingStorage::new());
    let service = AccountService::new(storage.clone(), LedgerConfig::default());
    let fixture = StandardAccounts::create(&service).await?;

    storage.set_failing(true);
    let result = service
        .transfer(fixture.savings.id, fixture.checking.id, dec!(400))
        .await;
    assert!(matches!(result, Err(LedgerError::Storage(_))));

    let savings = service.get_account(fixture.savings.id).await?;
    let checking = service.get_account(fixture.checking.id).await?;
    assert_eq!(savings, fixture.savings);
    assert_eq!(checking, fixture.checking);

    storage.set_failing(false);
    service
        .transfer(fixture.savings.id, fixture.checking.id, dec!(400))
        .await?;
    assert_eq!(
        service.get_account(fixture.checking.id).await?.balance(),
        dec!(400)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_with_scheduler_running() -> Result<()> {
    let (service, _storage) = test_service();
    let a = service
        .create_account("A".into(), AccountType::Deposit, Currency::Sek, dec!(1000))
        .await?;
    let b = service
        .create_account("B".into(), AccountType::Deposit, Currency::Sek, dec!(1000))
        .await?;
    let savings = service
        .create_account("Savings".into(), AccountType::Savings, Currency::Sek, dec!(1000))
        .await?;
    let backdated = Utc::now() - ChronoDuration::days(400);
    rewrite_account(&service, &savings, dec!(1000), backdated).await?;

    let scheduler = InterestScheduler::start(service.clone(), Duration::from_millis(1));

    let (a_id, b_id) = (a.id, b.id);
    let mut tasks = JoinSet::new();
    for i in 0..50 {
        let service = service.clone();
        tasks.spawn(async move {
            let (from, to) = if i % 2 == 0 { (a_id, b_id) } else { (b_id, a_id) };
            service.transfer(from, to, dec!(1)).await.map(|_| ())
        });
    }
    for _ in 0..20 {
        let service = service.clone();
        tasks.spawn(async move { service.deposit(a_id, dec!(5)).await.map(|_| ()) });
    }
    for _ in 0..10 {
        let service = service.clone();
        tasks.spawn(async move { service.withdraw(b_id, dec!(2)).await.map(|_| ()) });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    while scheduler.runs() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    scheduler.stop().await;

    let a = service.get_account(a.id).await?;
    let b = service.get_account(b.id).await?;
    let savings = service.get_account(savings.id).await?;

    // 25 transfers each way cancel out.
    assert_eq!(a.balance(), dec!(1100));
    assert_eq!(b.balance(), dec!(980));
    assert_eq!(a.transactions().len(), 70);
    assert_eq!(b.transactions().len(), 60);

    assert_eq!(savings.balance(), dec!(1021.92));
    assert_eq!(savings.transactions().len(), 1);
    assert_eq!(savings.transactions()[0].transaction_type, TransactionType::Interest);

    let total: Amount = service
        .get_accounts()
        .await?
        .iter()
        .map(|account| account.balance())
        .sum();
    assert_eq!(total, dec!(3000) + dec!(100) - dec!(20) + dec!(21.92));
    Ok(())
}
