mod common;

use anyhow::Result;
use bankdesk::application::{AppError, TopUpResult};
use bankdesk::domain::{AccountUpdate, LedgerCommand, RateTable, Transaction};
use bankdesk::io::Exporter;
use bankdesk::storage::Repository;
use common::{StandardAccounts, fund, test_service, test_service_with_rates};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

#[tokio::test]
async fn test_add_client_and_open_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let client = service
        .add_client("Taras", "Shevchenko", "taras@example.com")
        .await?;
    assert!(client.id > 0);

    let account = service.open_account(client.id).await?;
    assert!(account.id > 0);
    assert_eq!(account.client_id, client.id);
    assert_eq!(account.balance, dec!(0));
    assert_eq!(account.currency, "UAH");
    assert_eq!(account.account_number.len(), 16);

    let stored = service.get_account(account.id).await?;
    assert_eq!(stored.account_number, account.account_number);

    let accounts = service.list_accounts(Some(client.id)).await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(service.list_clients().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_client_validation_and_lookup() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.add_client("J0hn", "Doe", "").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidClient(_)));
    assert!(service.list_clients().await?.is_empty());

    let err = service.open_account(42).await.unwrap_err();
    assert!(matches!(err, AppError::ClientNotFound(42)));

    let err = service.get_account(7).await.unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(7)));

    Ok(())
}

#[tokio::test]
async fn test_top_up_same_currency_keeps_precision() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;

    let account = fund(&service, &accounts.first, dec!(10.005), "uah").await?;
    assert_eq!(account.balance, dec!(10.005));
    assert_eq!(
        service.get_account(accounts.first.id).await?.balance,
        dec!(10.005)
    );

    Ok(())
}

#[tokio::test]
async fn test_top_up_foreign_currency() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;

    match service.top_up(accounts.first.id, dec!(100), "USD").await? {
        TopUpResult::Credited { account, credited } => {
            assert_eq!(credited, dec!(4126.00));
            assert_eq!(account.balance, dec!(4126.00));
            assert_eq!(account.currency, "UAH");
        }
        other => panic!("expected credit, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_negative_top_up_is_a_no_op() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;
    fund(&service, &accounts.first, dec!(25), "UAH").await?;

    let result = service.top_up(accounts.first.id, dec!(-5), "UAH").await?;
    assert!(matches!(result, TopUpResult::NegativeAmount(_)));
    assert_eq!(service.get_account(accounts.first.id).await?.balance, dec!(25));

    Ok(())
}

#[tokio::test]
async fn test_top_up_unknown_currency() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;

    let err = service
        .top_up(accounts.first.id, dec!(5), "GBP")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownCurrency(_)));
    assert_eq!(service.get_account(accounts.first.id).await?.balance, dec!(0));

    Ok(())
}

#[tokio::test]
async fn test_top_up_out_of_range_changes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;

    let err = service
        .top_up(accounts.first.id, Decimal::MAX, "USD")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AmountOutOfRange(_)));
    assert_eq!(service.get_account(accounts.first.id).await?.balance, dec!(0));

    let full = fund(&service, &accounts.second, Decimal::MAX, "UAH").await?;
    assert_eq!(full.balance, Decimal::MAX);

    let err = service
        .top_up(accounts.second.id, dec!(1), "UAH")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AmountOutOfRange(_)));
    assert_eq!(
        service.get_account(accounts.second.id).await?.balance,
        Decimal::MAX
    );

    Ok(())
}

#[tokio::test]
async fn test_convert_account_and_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;
    fund(&service, &accounts.first, dec!(1234.56), "UAH").await?;

    let to_usd = service.convert_account(accounts.first.id, "usd").await?;
    assert_eq!(to_usd.previous_currency, "UAH");
    assert_eq!(to_usd.previous_balance, dec!(1234.56));
    assert_eq!(to_usd.account.currency, "USD");
    assert_eq!(to_usd.account.balance, dec!(29.92));

    let stored = service.get_account(accounts.first.id).await?;
    assert_eq!(stored.currency, "USD");
    assert_eq!(stored.balance, dec!(29.92));

    let back = service.convert_account(accounts.first.id, "UAH").await?;
    assert_eq!(back.account.currency, "UAH");
    // 29.92 * 41.26 = 1234.4992
    assert_eq!(back.account.balance, dec!(1234.50));

    Ok(())
}

#[tokio::test]
async fn test_convert_account_unknown_currency() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;
    fund(&service, &accounts.first, dec!(500), "UAH").await?;

    let err = service
        .convert_account(accounts.first.id, "JPY")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownCurrency(ref code) if code == "JPY"));

    let stored = service.get_account(accounts.first.id).await?;
    assert_eq!(stored.balance, dec!(500));
    assert_eq!(stored.currency, "UAH");

    Ok(())
}

#[tokio::test]
async fn test_total_in_uah_is_read_only() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;
    fund(&service, &accounts.first, dec!(4823), "UAH").await?;
    service.convert_account(accounts.first.id, "EUR").await?;

    assert_eq!(service.total_in_uah(accounts.first.id).await?, dec!(4823.00));

    let stored = service.get_account(accounts.first.id).await?;
    assert_eq!(stored.currency, "EUR");
    assert_eq!(stored.balance, dec!(100.00));

    let info = service.get_account_info(accounts.first.id).await?;
    assert_eq!(info.total_in_uah, dec!(4823.00));
    assert_eq!(info.client.id, accounts.client.id);

    Ok(())
}

#[tokio::test]
async fn test_custom_rate_table() -> Result<()> {
    let rates = RateTable::from_rates([("USD", dec!(40)), ("PLN", dec!(10))])?;
    let (service, _temp) = test_service_with_rates(rates).await?;
    let accounts = StandardAccounts::create(&service).await?;

    let account = fund(&service, &accounts.first, dec!(3), "PLN").await?;
    assert_eq!(account.balance, dec!(30.00));

    let err = service
        .top_up(accounts.first.id, dec!(1), "EUR")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownCurrency(_)));

    let codes: Vec<String> = service.rates().into_iter().map(|(code, _)| code).collect();
    assert_eq!(codes, vec!["PLN", "UAH", "USD"]);

    Ok(())
}

#[tokio::test]
async fn test_integrity_stats_on_unmigrated_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("empty.db");
    let repo = Repository::connect(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;

    let err = repo.get_integrity_stats().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to count clients");

    Ok(())
}

#[tokio::test]
async fn test_ledger_command_is_all_or_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("atomic.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;

    let mut client = bankdesk::domain::Client::new("Ivan", "Franko", "")?;
    repo.save_client(&mut client).await?;
    let mut account = bankdesk::domain::BankAccount::open(client.id);
    repo.save_account(&mut account).await?;

    // the audit record points at an account that does not exist, so the
    // insert fails after the balance update already ran
    let mut command = LedgerCommand {
        updates: vec![AccountUpdate {
            account_id: account.id,
            balance: dec!(999),
            currency: "UAH".into(),
        }],
        transaction: Some(Transaction::new(account.id, 12345, dec!(1), "UAH")),
    };
    assert!(repo.apply(&mut command).await.is_err());

    let stored = repo.get_account(account.id).await?.unwrap();
    assert_eq!(stored.balance, dec!(0));
    assert!(repo.list_transactions(None).await?.is_empty());

    // second update targets a missing row: the first one is rolled back too
    let mut command = LedgerCommand {
        updates: vec![
            AccountUpdate {
                account_id: account.id,
                balance: dec!(999),
                currency: "UAH".into(),
            },
            AccountUpdate {
                account_id: 12345,
                balance: dec!(1),
                currency: "UAH".into(),
            },
        ],
        transaction: None,
    };
    assert!(repo.apply(&mut command).await.is_err());
    assert_eq!(repo.get_account(account.id).await?.unwrap().balance, dec!(0));

    Ok(())
}

#[tokio::test]
async fn test_store_contract_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("store.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;

    let mut client = bankdesk::domain::Client::new("Lesya", "Ukrainka", "lesya@example.com")?;
    repo.save_client(&mut client).await?;
    assert_eq!(repo.get_client(client.id).await?.unwrap().email, "lesya@example.com");
    assert!(repo.get_client(client.id + 1).await?.is_none());

    let mut first = bankdesk::domain::BankAccount::open(client.id);
    let mut second = bankdesk::domain::BankAccount::open(client.id);
    repo.save_account(&mut first).await?;
    repo.save_account(&mut second).await?;

    first.balance = dec!(12.34);
    first.currency = "EUR".into();
    repo.update_account(&first).await?;
    let stored = repo.get_account(first.id).await?.unwrap();
    assert_eq!(stored.balance, dec!(12.34));
    assert_eq!(stored.currency, "EUR");

    let mut record = Transaction::new(first.id, second.id, dec!(5), "EUR");
    repo.save_transaction(&mut record).await?;
    assert!(record.id > 0);
    let stored = repo.get_transaction(record.id).await?.unwrap();
    assert_eq!(stored.amount, dec!(5));
    assert_eq!(stored.currency, "EUR");

    Ok(())
}

#[tokio::test]
async fn test_integrity_check() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;
    fund(&service, &accounts.first, dec!(3000), "UAH").await?;
    fund(&service, &accounts.second, dec!(0.005), "UAH").await?;
    service
        .transfer(accounts.first.id, accounts.second.id, dec!(50), "USD")
        .await?;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.client_count, 1);
    assert_eq!(report.account_count, 2);
    assert_eq!(report.transaction_count, 1);
    // 2063.005 on the receiver rounds half-up to 2063.01
    assert_eq!(report.balance_by_currency.get("UAH"), Some(&dec!(3000.01)));
    // the transfer rounded the receiver, nothing else carries extra decimals
    assert!(report.unrounded_accounts.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_export_csv_and_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let accounts = StandardAccounts::create(&service).await?;
    fund(&service, &accounts.first, dec!(3000), "UAH").await?;
    service
        .transfer(accounts.first.id, accounts.second.id, dec!(50), "USD")
        .await?;

    let exporter = Exporter::new(&service);

    let mut csv_out = Vec::new();
    let count = exporter.export_transactions_csv(&mut csv_out).await?;
    assert_eq!(count, 1);
    let csv_text = String::from_utf8(csv_out)?;
    let mut lines = csv_text.lines();
    assert_eq!(lines.next(), Some("id,time,sender,receiver,amount,currency"));
    assert!(lines.next().unwrap().ends_with(",50,UAH"));

    let mut json_out = Vec::new();
    let snapshot = exporter.export_full_json(&mut json_out).await?;
    assert_eq!(snapshot.accounts.len(), 2);
    assert_eq!(snapshot.transactions.len(), 1);
    let parsed: serde_json::Value = serde_json::from_slice(&json_out)?;
    assert_eq!(parsed["accounts"][0]["balance"], "937.00");

    Ok(())
}
