use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Amount, ClientId, PIVOT_CURRENCY};

pub type AccountId = i64;

/// Length of a generated account number
pub const ACCOUNT_NUMBER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Assigned by the repository on save, 0 until then
    pub id: AccountId,
    pub account_number: String,
    /// Never negative. Only the ledger changes it.
    pub balance: Amount,
    /// Canonical uppercase currency code
    pub currency: String,
    pub client_id: ClientId,
    pub created_at: DateTime<Utc>,
}

impl BankAccount {
    /// A fresh, empty hryvnia account for the given client.
    pub fn open(client_id: ClientId) -> Self {
        Self::with_number(client_id, generate_account_number(&mut rand::thread_rng()))
    }

    pub fn with_number(client_id: ClientId, account_number: impl Into<String>) -> Self {
        Self {
            id: 0,
            account_number: account_number.into(),
            balance: Decimal::ZERO,
            currency: PIVOT_CURRENCY.to_string(),
            client_id,
            created_at: Utc::now(),
        }
    }
}

/// Random decimal digits, leading zeros allowed.
pub fn generate_account_number<R: Rng>(rng: &mut R) -> String {
    (0..ACCOUNT_NUMBER_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
