use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use crate::application::{BankService, TopUpResult};
use crate::domain::{PIVOT_CURRENCY, RateTable, canonical_code, format_amount, parse_amount};

/// Bankdesk - client, account and transfer desk
#[derive(Parser)]
#[command(name = "bankdesk")]
#[command(about = "A single-operator desk for bank clients, accounts and multi-currency transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "BANKDESK_DB", default_value = "bankdesk.db")]
    pub database: String,

    /// JSON file with currency -> UAH rates, e.g. {"USD": "41.26"}
    #[arg(long, env = "BANKDESK_RATES", global = true)]
    pub rates: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Client(ClientCommands),

    /// Bank account commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Top up an account
    TopUp {
        /// Account ID
        account: i64,

        /// Amount (e.g., "50.00" or "50")
        #[arg(allow_negative_numbers = true)]
        amount: String,

        /// Currency the amount is given in
        currency: String,
    },

    /// Transfer money between two accounts
    Transfer {
        /// Amount (e.g., "50.00" or "50")
        #[arg(allow_negative_numbers = true)]
        amount: String,

        /// Currency the amount is given in
        currency: String,

        /// Sender account ID
        #[arg(long)]
        from: i64,

        /// Receiver account ID
        #[arg(long)]
        to: i64,
    },

    /// Convert an account's balance to another currency
    Convert {
        /// Account ID
        account: i64,

        /// Target currency
        currency: String,
    },

    /// Show an account's total balance in UAH
    Total {
        /// Account ID
        account: i64,
    },

    /// Show current currency rates
    Rates,

    /// List transfer records
    Transactions {
        /// Only transfers sent or received by this account
        #[arg(long)]
        account: Option<i64>,
    },

    /// Verify stored data against the ledger rules
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: accounts, transactions, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv, json for full)
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a new customer
    Add {
        /// First name (letters only)
        #[arg(long)]
        first_name: String,

        /// Last name (letters only)
        #[arg(long)]
        last_name: String,

        /// Email
        #[arg(long)]
        email: String,
    },

    /// List all customers
    List,

    /// Show a customer and their accounts
    Show {
        /// Client ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new UAH account for a customer
    Open {
        /// Client ID
        client: i64,
    },

    /// List accounts
    List {
        /// Only accounts of this client
        #[arg(long)]
        client: Option<i64>,
    },

    /// Show detailed account information
    Show {
        /// Account ID
        id: i64,
    },
}

impl Cli {
    /// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_logging(&self) {
        let default = if self.verbose { "bankdesk=debug" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        // a second init (tests, embedding) keeps the first subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    pub async fn run(self) -> Result<()> {
        let rates = load_rates(self.rates.as_deref())?;

        match self.command {
            Commands::Init => {
                BankService::init(&self.database, rates).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Client(cmd) => {
                let service = BankService::connect(&self.database, rates).await?;
                run_client_command(&service, cmd).await?;
            }

            Commands::Account(cmd) => {
                let service = BankService::connect(&self.database, rates).await?;
                run_account_command(&service, cmd).await?;
            }

            Commands::TopUp {
                account,
                amount,
                currency,
            } => {
                let service = BankService::connect(&self.database, rates).await?;
                let amount =
                    parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                match service.top_up(account, amount, &currency).await? {
                    TopUpResult::Credited { account, .. } => println!(
                        "Account topped up successfully. New balance: {} {}",
                        format_amount(account.balance),
                        account.currency
                    ),
                    TopUpResult::NegativeAmount(_) => {
                        println!("Amount cannot be negative. Please try again.")
                    }
                }
            }

            Commands::Transfer {
                amount,
                currency,
                from,
                to,
            } => {
                let service = BankService::connect(&self.database, rates).await?;
                let amount =
                    parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let result = service.transfer(from, to, amount, &currency).await?;

                println!(
                    "{}",
                    transfer_summary(amount, &currency, from, to, result.transaction.id)
                );
                println!(
                    "  Sender:   -{} {} (balance {} {})",
                    format_amount(result.debited),
                    result.sender.currency,
                    format_amount(result.sender.balance),
                    result.sender.currency
                );
                println!(
                    "  Receiver: +{} {} (balance {} {})",
                    format_amount(result.credited),
                    result.receiver.currency,
                    format_amount(result.receiver.balance),
                    result.receiver.currency
                );
            }

            Commands::Convert { account, currency } => {
                let service = BankService::connect(&self.database, rates).await?;
                let result = service.convert_account(account, &currency).await?;
                println!(
                    "Account converted: {} {} -> {} {}",
                    format_amount(result.previous_balance),
                    result.previous_currency,
                    format_amount(result.account.balance),
                    result.account.currency
                );
            }

            Commands::Total { account } => {
                let service = BankService::connect(&self.database, rates).await?;
                let total = service.total_in_uah(account).await?;
                println!("Balance in {}: {}", PIVOT_CURRENCY, format_amount(total));
            }

            Commands::Rates => {
                println!("Current currency rates:");
                for (code, rate) in rates.list_rates() {
                    println!("1 {} = {} {}", code, rate, PIVOT_CURRENCY);
                }
            }

            Commands::Transactions { account } => {
                let service = BankService::connect(&self.database, rates).await?;
                run_transactions_command(&service, account).await?;
            }

            Commands::Check => {
                let service = BankService::connect(&self.database, rates).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let service = BankService::connect(&self.database, rates).await?;
                run_export_command(&service, &export_type, output.as_deref(), format.as_deref())
                    .await?;
            }
        }

        Ok(())
    }
}

/// Seed rates, or the rates from a JSON file when one is given.
pub fn load_rates(path: Option<&str>) -> Result<RateTable> {
    match path {
        None => Ok(RateTable::seeded()),
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rates file: {}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid rates file: {}", path))
        }
    }
}

async fn run_client_command(service: &BankService, cmd: ClientCommands) -> Result<()> {
    match cmd {
        ClientCommands::Add {
            first_name,
            last_name,
            email,
        } => {
            let client = service.add_client(&first_name, &last_name, &email).await?;
            println!("Customer added: {} (ID {})", client.full_name(), client.id);
        }

        ClientCommands::List => {
            let clients = service.list_clients().await?;
            if clients.is_empty() {
                println!("No customers found.");
            } else {
                println!("{:<6} {:<30} EMAIL", "ID", "NAME");
                println!("{}", "-".repeat(60));
                for client in clients {
                    println!(
                        "{:<6} {:<30} {}",
                        client.id,
                        truncate(&client.full_name(), 30),
                        client.email
                    );
                }
            }
        }

        ClientCommands::Show { id } => {
            let client = service.get_client(id).await?;
            let accounts = service.list_accounts(Some(id)).await?;

            println!("Customer: {}", client.full_name());
            println!("  ID:      {}", client.id);
            println!("  Email:   {}", client.email);
            println!(
                "  Created: {}",
                client.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Accounts:");
            if accounts.is_empty() {
                println!("    (none)");
            }
            for account in accounts {
                println!(
                    "    #{:<5} {}  {:>14} {}",
                    account.id,
                    account.account_number,
                    format_amount(account.balance),
                    account.currency
                );
            }
        }
    }
    Ok(())
}

async fn run_account_command(service: &BankService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open { client } => {
            let account = service.open_account(client).await?;
            println!(
                "Bank account created. Account Number: {} (ID {})",
                account.account_number, account.id
            );
        }

        AccountCommands::List { client } => {
            let accounts = service.list_accounts(client).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<6} {:<18} {:<8} {:>14} {:<8}",
                    "ID", "NUMBER", "CLIENT", "BALANCE", "CURRENCY"
                );
                println!("{}", "-".repeat(58));
                for account in accounts {
                    println!(
                        "{:<6} {:<18} {:<8} {:>14} {:<8}",
                        account.id,
                        account.account_number,
                        account.client_id,
                        format_amount(account.balance),
                        account.currency
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let info = service.get_account_info(id).await?;
            let account = &info.account;

            println!("Account: {}", account.account_number);
            println!("  ID:           {}", account.id);
            println!(
                "  Owner:        {} (client {})",
                info.client.full_name(),
                info.client.id
            );
            println!(
                "  Balance:      {} {}",
                format_amount(account.balance),
                account.currency
            );
            println!(
                "  In {}:       {}",
                PIVOT_CURRENCY,
                format_amount(info.total_in_uah)
            );
            println!("  Transactions: {}", info.transaction_count);
            println!(
                "  Opened:       {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

async fn run_transactions_command(service: &BankService, account: Option<i64>) -> Result<()> {
    let transactions = service.list_transactions(account).await?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:>8} {:>8} {:>14} {:<8}",
        "ID", "TIME", "FROM", "TO", "AMOUNT", "CURRENCY"
    );
    println!("{}", "-".repeat(70));
    for tx in transactions {
        println!(
            "{:<6} {:<20} {:>8} {:>8} {:>14} {:<8}",
            tx.id,
            tx.time.format("%Y-%m-%d %H:%M:%S"),
            tx.sender_account,
            tx.receiver_account,
            tx.amount,
            tx.currency
        );
    }
    Ok(())
}

async fn run_check_command(service: &BankService) -> Result<()> {
    println!("Checking stored data...\n");

    let report = service.check_integrity().await?;

    println!("Clients:      {}", report.client_count);
    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    println!("Balance by currency:");
    for (currency, total) in &report.balance_by_currency {
        println!("  {:<6} {:>16}", currency, format_amount(*total));
    }
    println!();

    if !report.unrounded_accounts.is_empty() {
        println!(
            "Note: {} account(s) carry more than two decimals from same-currency top-ups",
            report.unrounded_accounts.len()
        );
    }

    if report.is_healthy() {
        println!("Data is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &BankService,
    export_type: &str,
    output: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let json = match format {
        None | Some("csv") => false,
        Some("json") => true,
        Some(other) => anyhow::bail!("Invalid format '{}'. Valid formats: csv, json", other),
    };

    match export_type {
        "accounts" => {
            let count = if json {
                exporter.export_accounts_json(writer).await?
            } else {
                exporter.export_accounts_csv(writer).await?
            };
            if output.is_some() {
                eprintln!("Exported {} accounts", count);
            }
        }
        "transactions" => {
            let count = if json {
                exporter.export_transactions_json(writer).await?
            } else {
                exporter.export_transactions_csv(writer).await?
            };
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} clients, {} accounts, {} transactions",
                    snapshot.clients.len(),
                    snapshot.accounts.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: accounts, transactions, full",
                export_type
            );
        }
    }

    Ok(())
}

fn transfer_summary(amount: Decimal, currency: &str, from: i64, to: i64, id: i64) -> String {
    format!(
        "Transaction committed: {} {} from account {} to account {} (#{})",
        amount,
        canonical_code(currency),
        from,
        to,
        id
    )
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
