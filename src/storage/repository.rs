use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::domain::{
    AccountId, AccountUpdate, BankAccount, Client, ClientId, LedgerCommand, Transaction,
    TransactionId,
};

use super::MIGRATION_001_INITIAL;

/// Statistics for integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub client_count: i64,
    pub transaction_count: i64,
    /// `(transaction_id, missing_account_id)` pairs
    pub dangling_refs: Vec<(TransactionId, AccountId)>,
}

/// Repository for persisting and querying clients, accounts and transactions.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Client operations
    // ========================

    /// Insert a new client and assign its id.
    pub async fn save_client(&self, client: &mut Client) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO clients (first_name, last_name, email, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(client.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save client")?;

        client.id = result.last_insert_rowid();
        debug!(client_id = client.id, "client saved");
        Ok(())
    }

    pub async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, created_at FROM clients WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch client")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, email, created_at FROM clients ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list clients")?;

        rows.iter().map(Self::row_to_client).collect()
    }

    fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client> {
        let created_at_str: String = row.get("created_at");

        Ok(Client {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            created_at: parse_timestamp(&created_at_str).context("Invalid client created_at")?,
        })
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account and assign its id.
    pub async fn save_account(&self, account: &mut BankAccount) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (account_number, balance, currency, client_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.account_number)
        .bind(account.balance.to_string())
        .bind(&account.currency)
        .bind(account.client_id)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;

        account.id = result.last_insert_rowid();
        debug!(account_id = account.id, "account saved");
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<BankAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_number, balance, currency, client_id, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List accounts, optionally only those of one client.
    pub async fn list_accounts(&self, client_id: Option<ClientId>) -> Result<Vec<BankAccount>> {
        let rows = match client_id {
            Some(client_id) => sqlx::query(
                r#"
                SELECT id, account_number, balance, currency, client_id, created_at
                FROM accounts
                WHERE client_id = ?
                ORDER BY id
                "#,
            )
            .bind(client_id)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                r#"
                SELECT id, account_number, balance, currency, client_id, created_at
                FROM accounts
                ORDER BY id
                "#,
            )
            .fetch_all(&self.pool)
            .await,
        }
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Persist a single account's balance and currency.
    pub async fn update_account(&self, account: &BankAccount) -> Result<()> {
        self.apply(&mut LedgerCommand {
            updates: vec![AccountUpdate {
                account_id: account.id,
                balance: account.balance,
                currency: account.currency.clone(),
            }],
            transaction: None,
        })
        .await
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<BankAccount> {
        let balance_str: String = row.get("balance");
        let created_at_str: String = row.get("created_at");

        Ok(BankAccount {
            id: row.get("id"),
            account_number: row.get("account_number"),
            balance: Decimal::from_str(&balance_str).context("Invalid account balance")?,
            currency: row.get("currency"),
            client_id: row.get("client_id"),
            created_at: parse_timestamp(&created_at_str).context("Invalid account created_at")?,
        })
    }

    // ========================
    // Ledger writes
    // ========================

    /// Apply every write of a ledger command inside one SQL transaction.
    ///
    /// An update that matches no account, or any failing statement, aborts
    /// the transaction and nothing is committed. On success the audit
    /// record (if any) gets its assigned id.
    pub async fn apply(&self, command: &mut LedgerCommand) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for update in &command.updates {
            Self::write_update(&mut tx, update).await?;
        }

        if let Some(record) = command.transaction.as_mut() {
            record.id = Self::insert_transaction(&mut tx, record).await?;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        debug!(
            updates = command.updates.len(),
            with_record = command.transaction.is_some(),
            "ledger command committed"
        );
        Ok(())
    }

    async fn write_update(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        update: &AccountUpdate,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET balance = ?, currency = ? WHERE id = ?")
            .bind(update.balance.to_string())
            .bind(&update.currency)
            .bind(update.account_id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to update account {}", update.account_id))?;

        if result.rows_affected() != 1 {
            bail!("Account {} disappeared during update", update.account_id);
        }
        Ok(())
    }

    async fn insert_transaction(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        record: &Transaction,
    ) -> Result<TransactionId> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (sender_account_id, receiver_account_id, amount, currency, time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.sender_account)
        .bind(record.receiver_account)
        .bind(record.amount.to_string())
        .bind(&record.currency)
        .bind(record.time.to_rfc3339())
        .execute(&mut **tx)
        .await
        .context("Failed to save transaction")?;

        Ok(result.last_insert_rowid())
    }

    // ========================
    // Transaction records
    // ========================

    /// Insert a standalone audit record.
    pub async fn save_transaction(&self, record: &mut Transaction) -> Result<()> {
        let mut command = LedgerCommand {
            updates: Vec::new(),
            transaction: Some(record.clone()),
        };
        self.apply(&mut command).await?;
        if let Some(saved) = command.transaction {
            record.id = saved.id;
        }
        Ok(())
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, sender_account_id, receiver_account_id, amount, currency, time
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// List transactions ordered by id, optionally only those touching an account.
    pub async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Transaction>> {
        let rows = match account_id {
            Some(account_id) => sqlx::query(
                r#"
                SELECT id, sender_account_id, receiver_account_id, amount, currency, time
                FROM transactions
                WHERE sender_account_id = ? OR receiver_account_id = ?
                ORDER BY id
                "#,
            )
            .bind(account_id)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                r#"
                SELECT id, sender_account_id, receiver_account_id, amount, currency, time
                FROM transactions
                ORDER BY id
                "#,
            )
            .fetch_all(&self.pool)
            .await,
        }
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let amount_str: String = row.get("amount");
        let time_str: String = row.get("time");

        Ok(Transaction {
            id: row.get("id"),
            sender_account: row.get("sender_account_id"),
            receiver_account: row.get("receiver_account_id"),
            amount: Decimal::from_str(&amount_str).context("Invalid transaction amount")?,
            currency: row.get("currency"),
            time: parse_timestamp(&time_str).context("Invalid transaction time")?,
        })
    }

    // ========================
    // Integrity
    // ========================

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let client_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM clients")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count clients")?
            .get("count");

        let transaction_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?
            .get("count");

        let rows = sqlx::query(
            r#"
            SELECT t.id as transaction_id, t.sender_account_id as account_id
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.sender_account_id)
            UNION ALL
            SELECT t.id as transaction_id, t.receiver_account_id as account_id
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.receiver_account_id)
            ORDER BY transaction_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to check transaction references")?;

        let dangling_refs = rows
            .iter()
            .map(|row| (row.get("transaction_id"), row.get("account_id")))
            .collect();

        Ok(IntegrityStats {
            client_count,
            transaction_count,
            dangling_refs,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
