//! Ledger records and query parameters
//!
//! Balances are signed integers in minor currency units. Entries and
//! transfers are append-only; the only mutation after creation is an
//! administrative delete.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Currency
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Unsupported currency: {0}")]
    Unsupported(String),
}

/// Supported account currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Cad,
    Gbp,
    Eur,
    Aud,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Cad,
        Currency::Gbp,
        Currency::Eur,
        Currency::Aud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Cad => "CAD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Aud => "AUD",
        }
    }

    /// Check a currency code at the request boundary
    pub fn is_supported(code: &str) -> bool {
        code.parse::<Currency>().is_ok()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CurrencyError::Unsupported(s.to_string()))
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// One signed balance change; negative = debit, positive = credit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Sentinel stored in `password_changed_at` until the first password change
pub fn password_never_changed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl User {
    pub fn password_never_changed(&self) -> bool {
        self.password_changed_at <= password_never_changed_at()
    }
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: i64,
    pub offset: i64,
}

/// Administrative overwrite; transfers use [`AddAccountBalanceParams`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateAccountParams {
    pub id: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Matches transfers where the sender is `from_account_id` OR the receiver is `to_account_id`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}
