// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use bankdesk::application::{BankService, TopUpResult};
use bankdesk::domain::{Amount, BankAccount, Client, RateTable};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database and seed rates
pub async fn test_service() -> Result<(BankService, TempDir)> {
    test_service_with_rates(RateTable::seeded()).await
}

pub async fn test_service_with_rates(rates: RateTable) -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BankService::init(db_path.to_str().unwrap(), rates).await?;
    Ok((service, temp_dir))
}

/// Test fixture: one client with two empty UAH accounts
pub struct StandardAccounts {
    pub client: Client,
    pub first: BankAccount,
    pub second: BankAccount,
}

impl StandardAccounts {
    pub async fn create(service: &BankService) -> Result<Self> {
        let client = service
            .add_client("Olena", "Kovalenko", "olena@example.com")
            .await?;
        let first = service.open_account(client.id).await?;
        let second = service.open_account(client.id).await?;
        Ok(Self {
            client,
            first,
            second,
        })
    }
}

/// Top up an account and return its committed state
pub async fn fund(
    service: &BankService,
    account: &BankAccount,
    amount: Amount,
    currency: &str,
) -> Result<BankAccount> {
    match service.top_up(account.id, amount, currency).await? {
        TopUpResult::Credited { account, .. } => Ok(account),
        TopUpResult::NegativeAmount(amount) => anyhow::bail!("refused top-up of {}", amount),
    }
}
