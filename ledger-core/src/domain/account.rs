//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account owned by exactly one user, holding a balance in one currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Opaque ownership token supplied by the auth boundary
    pub user_id: Uuid,
    /// Never negative at any observable point
    pub balance: Decimal,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Largest balance held exactly: 20 integer and 8 fractional digits
    pub const MAX_BALANCE: Decimal = Decimal::from_parts(268_435_455, 1_042_612_833, 542_101_086, false, 8);

    /// Create a new zero-balance account
    pub fn new(user_id: Uuid, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Decimal::ZERO,
            currency: Self::normalize_currency(currency),
            created_at: Utc::now(),
        }
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Three uppercase ASCII letters
    pub fn is_currency_code(code: &str) -> bool {
        code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
    }

    /// `balance + amount`, or None when the result would pass `MAX_BALANCE`
    pub fn checked_credit(balance: Decimal, amount: Decimal) -> Option<Decimal> {
        balance.checked_add(amount).filter(|b| *b <= Self::MAX_BALANCE)
    }

    /// `balance - amount`, or None when the balance does not cover it
    pub fn checked_debit(balance: Decimal, amount: Decimal) -> Option<Decimal> {
        balance.checked_sub(amount).filter(|b| *b >= Decimal::ZERO)
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if !Self::is_currency_code(&self.currency) {
            return Err("currency must be a three-letter code");
        }
        if self.balance < Decimal::ZERO {
            return Err("balance cannot be negative");
        }
        if self.balance > Self::MAX_BALANCE {
            return Err("balance exceeds the supported maximum");
        }
        Ok(())
    }
}
