use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::BankService;
use crate::domain::{BankAccount, Client, Transaction};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub rates: Vec<(String, Decimal)>,
    pub clients: Vec<Client>,
    pub accounts: Vec<BankAccount>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for writing desk data out as CSV or JSON
pub struct Exporter<'a> {
    service: &'a BankService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a BankService) -> Self {
        Self { service }
    }

    /// Export accounts to CSV format
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "account_number",
            "client_id",
            "balance",
            "currency",
            "created_at",
        ])?;

        for account in &accounts {
            csv_writer.write_record([
                account.id.to_string(),
                account.account_number.clone(),
                account.client_id.to_string(),
                account.balance.to_string(),
                account.currency.clone(),
                account.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export transactions to CSV format
    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self.service.list_transactions(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "time", "sender", "receiver", "amount", "currency"])?;

        for tx in &transactions {
            csv_writer.write_record([
                tx.id.to_string(),
                tx.time.to_rfc3339(),
                tx.sender_account.to_string(),
                tx.receiver_account.to_string(),
                tx.amount.to_string(),
                tx.currency.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export accounts as a JSON array
    pub async fn export_accounts_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts(None).await?;
        serde_json::to_writer_pretty(&mut writer, &accounts)?;
        writer.flush()?;
        Ok(accounts.len())
    }

    /// Export transactions as a JSON array
    pub async fn export_transactions_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let transactions = self.service.list_transactions(None).await?;
        serde_json::to_writer_pretty(&mut writer, &transactions)?;
        writer.flush()?;
        Ok(transactions.len())
    }

    /// Export the full database as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            rates: self.service.rates(),
            clients: self.service.list_clients().await?,
            accounts: self.service.list_accounts(None).await?,
            transactions: self.service.list_transactions(None).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
