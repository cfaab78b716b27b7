use thiserror::Error;

use crate::domain::{AccountId, Amount, ClientError, ClientId, LedgerError, TransactionId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Rates for currency {0} not found")]
    UnknownCurrency(String),

    #[error(
        "Insufficient funds in account {account_id}: balance {balance} {currency}, required {required} {currency}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        balance: Amount,
        required: Amount,
        currency: String,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Amount),

    #[error(transparent)]
    InvalidClient(#[from] ClientError),

    /// Store failure. Nothing from the failed operation was committed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownCurrency(code) => AppError::UnknownCurrency(code),
            LedgerError::InsufficientFunds {
                account_id,
                balance,
                required,
                currency,
            } => AppError::InsufficientFunds {
                account_id,
                balance,
                required,
                currency,
            },
            LedgerError::InvalidAmount(amount) => {
                AppError::InvalidAmount(format!("{} (must be positive)", amount))
            }
            LedgerError::SameAccount(id) => AppError::SameAccount(id),
            LedgerError::AmountOutOfRange(amount) => AppError::AmountOutOfRange(amount),
        }
    }
}
