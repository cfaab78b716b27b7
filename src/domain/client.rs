use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ClientId = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("First name must contain letters only, got '{0}'")]
    InvalidFirstName(String),

    #[error("Last name must contain letters only, got '{0}'")]
    InvalidLastName(String),
}

/// A bank customer. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Assigned by the repository on save, 0 until then
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Validate and build a new, unsaved client.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let first_name = first_name.into().trim().to_string();
        let last_name = last_name.into().trim().to_string();

        if !is_letters_only(&first_name) {
            return Err(ClientError::InvalidFirstName(first_name));
        }
        if !is_letters_only(&last_name) {
            return Err(ClientError::InvalidLastName(last_name));
        }

        Ok(Self {
            id: 0,
            first_name,
            last_name,
            email: email.into().trim().to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn is_letters_only(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic())
}
