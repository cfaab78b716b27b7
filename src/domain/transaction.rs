use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount};

pub type TransactionId = i64;

/// Audit record of one completed transfer. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by the repository on save, 0 until then
    pub id: TransactionId,
    pub sender_account: AccountId,
    pub receiver_account: AccountId,
    /// The amount as the operator entered it, before any conversion
    pub amount: Amount,
    /// The sender account's currency after the debit. This is not
    /// necessarily the currency `amount` was entered in.
    pub currency: String,
    pub time: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        sender_account: AccountId,
        receiver_account: AccountId,
        amount: Amount,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            sender_account,
            receiver_account,
            amount,
            currency: currency.into(),
            time: Utc::now(),
        }
    }

    pub fn involves(&self, account: AccountId) -> bool {
        self.sender_account == account || self.receiver_account == account
    }
}
