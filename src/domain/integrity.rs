use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

use super::{AccountId, Amount, BankAccount, RateTable, round2};

/// Something wrong (or worth noting) about a stored account.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityIssue {
    NegativeBalance {
        account_id: AccountId,
        balance: Amount,
    },
    UnregisteredCurrency {
        account_id: AccountId,
        currency: String,
    },
    DanglingTransaction {
        transaction_id: i64,
        account_id: AccountId,
    },
    /// The sum of all balances in this currency does not fit a decimal
    TotalOutOfRange {
        currency: String,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::NegativeBalance {
                account_id,
                balance,
            } => write!(f, "account {} has negative balance {}", account_id, balance),
            IntegrityIssue::UnregisteredCurrency {
                account_id,
                currency,
            } => write!(
                f,
                "account {} is held in unregistered currency {}",
                account_id, currency
            ),
            IntegrityIssue::DanglingTransaction {
                transaction_id,
                account_id,
            } => write!(
                f,
                "transaction {} references missing account {}",
                transaction_id, account_id
            ),
            IntegrityIssue::TotalOutOfRange { currency } => {
                write!(f, "total {} balance is out of range", currency)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub client_count: i64,
    pub account_count: i64,
    pub transaction_count: i64,
    /// Sum of balances per currency, ordered by code
    pub balance_by_currency: BTreeMap<String, Amount>,
    /// Accounts carrying more than two decimals (same-currency top-ups)
    pub unrounded_accounts: Vec<AccountId>,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Inspect accounts against the ledger invariants.
pub fn build_integrity_report(
    accounts: &[BankAccount],
    rates: &RateTable,
    client_count: i64,
    transaction_count: i64,
    dangling: Vec<(i64, AccountId)>,
) -> IntegrityReport {
    let mut balance_by_currency: BTreeMap<String, Amount> = BTreeMap::new();
    let mut unrounded_accounts = Vec::new();
    let mut issues = Vec::new();

    for account in accounts {
        let total = balance_by_currency
            .entry(account.currency.clone())
            .or_insert(Decimal::ZERO);
        match total.checked_add(account.balance) {
            Some(sum) => *total = sum,
            None => {
                let issue = IntegrityIssue::TotalOutOfRange {
                    currency: account.currency.clone(),
                };
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
        }

        if account.balance < Decimal::ZERO {
            issues.push(IntegrityIssue::NegativeBalance {
                account_id: account.id,
                balance: account.balance,
            });
        }
        if !rates.contains(&account.currency) {
            issues.push(IntegrityIssue::UnregisteredCurrency {
                account_id: account.id,
                currency: account.currency.clone(),
            });
        }
        if round2(account.balance) != account.balance {
            unrounded_accounts.push(account.id);
        }
    }

    issues.extend(
        dangling
            .into_iter()
            .map(|(transaction_id, account_id)| IntegrityIssue::DanglingTransaction {
                transaction_id,
                account_id,
            }),
    );

    IntegrityReport {
        client_count,
        account_count: accounts.len() as i64,
        transaction_count,
        balance_by_currency,
        unrounded_accounts,
        issues,
    }
}
