use rust_decimal::Decimal;
use thiserror::Error;

use super::{
    AccountId, Amount, BankAccount, ConversionError, PIVOT_CURRENCY, RateTable, Transaction,
    canonical_code, round2,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
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

    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Amount),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Amount),
}

impl From<ConversionError> for LedgerError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::UnknownCurrency(unknown) => LedgerError::UnknownCurrency(unknown.0),
            ConversionError::OutOfRange { amount, .. } => LedgerError::AmountOutOfRange(amount),
        }
    }
}

fn checked_balance(balance: Option<Amount>, amount: Amount) -> Result<Amount, LedgerError> {
    balance.ok_or(LedgerError::AmountOutOfRange(amount))
}

/// New state for one account row.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountUpdate {
    pub account_id: AccountId,
    pub balance: Amount,
    pub currency: String,
}

/// Every write one ledger operation needs. The store applies a command as a
/// single transaction: all of it is committed or none of it is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerCommand {
    pub updates: Vec<AccountUpdate>,
    pub transaction: Option<Transaction>,
}

impl LedgerCommand {
    fn update(update: AccountUpdate) -> Self {
        Self {
            updates: vec![update],
            transaction: None,
        }
    }

    /// The account as it looks once this command is committed.
    pub fn applied_to(&self, account: &BankAccount) -> BankAccount {
        let mut account = account.clone();
        if let Some(update) = self.updates.iter().find(|u| u.account_id == account.id) {
            account.balance = update.balance;
            account.currency = update.currency.clone();
        }
        account
    }
}

/// Result of a top-up request.
#[derive(Debug, Clone, PartialEq)]
pub enum TopUpOutcome {
    /// `credited` is in the account's currency
    Credit {
        command: LedgerCommand,
        credited: Amount,
    },
    /// Negative top-ups are refused without touching anything
    NegativeAmount(Amount),
}

/// A validated transfer ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub command: LedgerCommand,
    /// Taken from the sender, in the sender's currency
    pub debited: Amount,
    /// Given to the receiver, in the receiver's currency
    pub credited: Amount,
}

/// The only place balances and account currencies are computed.
///
/// Operations never mutate the accounts they are given; they return the
/// writes to perform. Every currency and funds check runs before a command
/// is built, so a failed operation has nothing to roll back.
pub struct Ledger<'a> {
    rates: &'a RateTable,
}

impl<'a> Ledger<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Credit `amount` given in `currency`.
    ///
    /// Foreign amounts are converted (and so rounded) into the account's
    /// currency. Same-currency amounts are added as entered, without rounding.
    pub fn top_up(
        &self,
        account: &BankAccount,
        amount: Amount,
        currency: &str,
    ) -> Result<TopUpOutcome, LedgerError> {
        if amount < Decimal::ZERO {
            return Ok(TopUpOutcome::NegativeAmount(amount));
        }

        let currency = canonical_code(currency);
        let credited = if currency.eq_ignore_ascii_case(&account.currency) {
            amount
        } else {
            self.rates.convert(&currency, &account.currency, amount)?
        };

        let balance = checked_balance(account.balance.checked_add(credited), amount)?;

        Ok(TopUpOutcome::Credit {
            command: LedgerCommand::update(AccountUpdate {
                account_id: account.id,
                balance,
                currency: account.currency.clone(),
            }),
            credited,
        })
    }

    /// Move `amount` given in `currency` from `sender` to `receiver`.
    ///
    /// The sender and receiver legs are two independent conversions of the
    /// original amount. The audit record keeps the original amount labelled
    /// with the sender's currency.
    pub fn transfer(
        &self,
        sender: &BankAccount,
        receiver: &BankAccount,
        amount: Amount,
        currency: &str,
    ) -> Result<TransferPlan, LedgerError> {
        if sender.id == receiver.id {
            return Err(LedgerError::SameAccount(sender.id));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let currency = canonical_code(currency);
        let debited = self.rates.convert(&currency, &sender.currency, amount)?;

        if sender.balance < debited {
            return Err(LedgerError::InsufficientFunds {
                account_id: sender.id,
                balance: sender.balance,
                required: debited,
                currency: sender.currency.clone(),
            });
        }

        let credited = self.rates.convert(&currency, &receiver.currency, amount)?;
        let sender_balance = checked_balance(sender.balance.checked_sub(debited), amount)?;
        let receiver_balance = checked_balance(receiver.balance.checked_add(credited), amount)?;

        let sender_update = AccountUpdate {
            account_id: sender.id,
            balance: round2(sender_balance),
            currency: sender.currency.clone(),
        };
        let receiver_update = AccountUpdate {
            account_id: receiver.id,
            balance: round2(receiver_balance),
            currency: receiver.currency.clone(),
        };
        let record = Transaction::new(sender.id, receiver.id, amount, &sender_update.currency);

        Ok(TransferPlan {
            command: LedgerCommand {
                updates: vec![sender_update, receiver_update],
                transaction: Some(record),
            },
            debited,
            credited,
        })
    }

    /// Re-denominate the whole balance into `target`.
    pub fn convert_currency(
        &self,
        account: &BankAccount,
        target: &str,
    ) -> Result<LedgerCommand, LedgerError> {
        let target = canonical_code(target);
        let balance = self
            .rates
            .convert(&account.currency, &target, account.balance)?;

        Ok(LedgerCommand::update(AccountUpdate {
            account_id: account.id,
            balance: round2(balance),
            currency: target,
        }))
    }

    /// The account balance expressed in hryvnias. Read only.
    pub fn total_in_uah(&self, account: &BankAccount) -> Result<Amount, LedgerError> {
        Ok(self
            .rates
            .convert(&account.currency, PIVOT_CURRENCY, account.balance)?)
    }
}
