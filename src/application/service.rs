use anyhow::anyhow;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::{
    AccountId, Amount, BankAccount, Client, ClientId, IntegrityReport, Ledger, LedgerError,
    RateTable, TopUpOutcome, Transaction, TransactionId, build_integrity_report,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the desk's operations.
/// This is the primary interface for any client (CLI, tests, ...).
///
/// Each operation runs to completion before the next one starts; there is
/// no locking. Sharing one database between several desks would need
/// per-account locking or serializable transactions in the store.
pub struct BankService {
    repo: Repository,
    rates: RateTable,
}

/// Result of a top-up request
#[derive(Debug)]
pub enum TopUpResult {
    /// The committed account and the amount added, in its currency
    Credited {
        account: BankAccount,
        credited: Amount,
    },
    /// Negative amounts are refused; nothing was written
    NegativeAmount(Amount),
}

/// Result of a committed transfer
#[derive(Debug)]
pub struct TransferResult {
    pub transaction: Transaction,
    pub sender: BankAccount,
    pub receiver: BankAccount,
    /// In the sender's currency
    pub debited: Amount,
    /// In the receiver's currency
    pub credited: Amount,
}

/// Result of re-denominating an account
#[derive(Debug)]
pub struct ConversionResult {
    pub account: BankAccount,
    pub previous_balance: Amount,
    pub previous_currency: String,
}

/// Account with its owner
pub struct AccountInfo {
    pub account: BankAccount,
    pub client: Client,
    pub total_in_uah: Amount,
    pub transaction_count: usize,
}

impl BankService {
    /// Create a new service over the given repository and rates.
    pub fn new(repo: Repository, rates: RateTable) -> Self {
        Self { repo, rates }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, rates: RateTable) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, rates))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, rates: RateTable) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, rates))
    }

    pub fn rate_table(&self) -> &RateTable {
        &self.rates
    }

    fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&self.rates)
    }

    // ========================
    // Clients
    // ========================

    /// Register a new customer.
    pub async fn add_client(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<Client, AppError> {
        let mut client = Client::new(first_name, last_name, email)?;
        self.repo.save_client(&mut client).await?;
        info!(client_id = client.id, name = %client.full_name(), "client registered");
        Ok(client)
    }

    pub async fn get_client(&self, id: ClientId) -> Result<Client, AppError> {
        self.repo
            .get_client(id)
            .await?
            .ok_or(AppError::ClientNotFound(id))
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        Ok(self.repo.list_clients().await?)
    }

    // ========================
    // Accounts
    // ========================

    /// Open an empty UAH account for an existing client.
    pub async fn open_account(&self, client_id: ClientId) -> Result<BankAccount, AppError> {
        let client = self.get_client(client_id).await?;
        let mut account = BankAccount::open(client.id);
        self.repo.save_account(&mut account).await?;
        info!(
            account_id = account.id,
            client_id,
            number = %account.account_number,
            "account opened"
        );
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<BankAccount, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    /// Account details together with its owner.
    pub async fn get_account_info(&self, id: AccountId) -> Result<AccountInfo, AppError> {
        let account = self.get_account(id).await?;
        let client = self.get_client(account.client_id).await?;
        let total_in_uah = self.ledger().total_in_uah(&account)?;
        let transaction_count = self.repo.list_transactions(Some(id)).await?.len();

        Ok(AccountInfo {
            account,
            client,
            total_in_uah,
            transaction_count,
        })
    }

    /// List accounts, optionally for one client only.
    pub async fn list_accounts(
        &self,
        client_id: Option<ClientId>,
    ) -> Result<Vec<BankAccount>, AppError> {
        if let Some(id) = client_id {
            self.get_client(id).await?;
        }
        Ok(self.repo.list_accounts(client_id).await?)
    }

    // ========================
    // Money movement
    // ========================

    /// Add money to an account. `amount` is given in `currency`.
    pub async fn top_up(
        &self,
        account_id: AccountId,
        amount: Amount,
        currency: &str,
    ) -> Result<TopUpResult, AppError> {
        let account = self.get_account(account_id).await?;

        match self.ledger().top_up(&account, amount, currency)? {
            TopUpOutcome::NegativeAmount(amount) => {
                warn!(account_id, %amount, "negative top-up refused");
                Ok(TopUpResult::NegativeAmount(amount))
            }
            TopUpOutcome::Credit {
                mut command,
                credited,
            } => {
                self.repo.apply(&mut command).await?;
                let account = command.applied_to(&account);
                info!(
                    account_id,
                    %credited,
                    balance = %account.balance,
                    currency = %account.currency,
                    "account topped up"
                );
                Ok(TopUpResult::Credited { account, credited })
            }
        }
    }

    /// Move money between two accounts. `amount` is given in `currency`.
    ///
    /// Both balance updates and the audit record are committed together.
    pub async fn transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
        currency: &str,
    ) -> Result<TransferResult, AppError> {
        let sender = self.get_account(sender_id).await?;
        let receiver = self.get_account(receiver_id).await?;

        let mut plan = match self.ledger().transfer(&sender, &receiver, amount, currency) {
            Ok(plan) => plan,
            Err(err) => {
                if let LedgerError::InsufficientFunds { .. } = err {
                    warn!(sender_id, receiver_id, %amount, currency, "transfer refused: insufficient funds");
                }
                return Err(err.into());
            }
        };

        self.repo.apply(&mut plan.command).await?;

        let transaction = plan
            .command
            .transaction
            .clone()
            .ok_or_else(|| anyhow!("transfer committed without an audit record"))?;
        let sender = plan.command.applied_to(&sender);
        let receiver = plan.command.applied_to(&receiver);

        info!(
            transaction_id = transaction.id,
            sender_id,
            receiver_id,
            %amount,
            debited = %plan.debited,
            credited = %plan.credited,
            "transfer committed"
        );

        Ok(TransferResult {
            transaction,
            sender,
            receiver,
            debited: plan.debited,
            credited: plan.credited,
        })
    }

    /// Re-denominate an account's whole balance into another currency.
    pub async fn convert_account(
        &self,
        account_id: AccountId,
        target_currency: &str,
    ) -> Result<ConversionResult, AppError> {
        let account = self.get_account(account_id).await?;
        let mut command = self.ledger().convert_currency(&account, target_currency)?;

        self.repo.apply(&mut command).await?;
        let converted = command.applied_to(&account);

        info!(
            account_id,
            from = %account.currency,
            to = %converted.currency,
            balance = %converted.balance,
            "account converted"
        );

        Ok(ConversionResult {
            account: converted,
            previous_balance: account.balance,
            previous_currency: account.currency,
        })
    }

    /// Account balance expressed in UAH. Read only.
    pub async fn total_in_uah(&self, account_id: AccountId) -> Result<Amount, AppError> {
        let account = self.get_account(account_id).await?;
        Ok(self.ledger().total_in_uah(&account)?)
    }

    /// Current rates, ordered by currency code.
    pub fn rates(&self) -> Vec<(String, Decimal)> {
        self.rates.list_rates()
    }

    // ========================
    // Transactions
    // ========================

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))
    }

    /// List audit records, optionally only those touching one account.
    pub async fn list_transactions(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Transaction>, AppError> {
        if let Some(id) = account_id {
            self.get_account(id).await?;
        }
        Ok(self.repo.list_transactions(account_id).await?)
    }

    // ========================
    // Integrity
    // ========================

    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let accounts = self.repo.list_accounts(None).await?;

        Ok(build_integrity_report(
            &accounts,
            &self.rates,
            stats.client_count,
            stats.transaction_count,
            stats.dangling_refs,
        ))
    }
}
