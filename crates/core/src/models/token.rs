//! Meal token model
//!
//! A token is a time-boxed, single-use claim check for one meal,
//! identified by an opaque code rendered as a scannable QR image.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

use super::MealType;

/// How long an issued token stays redeemable
pub const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Hard upper bound on special items per token
pub const MAX_SPECIALS: u32 = 10;

/// Token lifecycle states; `Used` and `Expired` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Used,
    Expired,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Used => "used",
            TokenStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenStatus::Used | TokenStatus::Expired)
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "active" => Ok(TokenStatus::Active),
            "used" => Ok(TokenStatus::Used),
            "expired" => Ok(TokenStatus::Expired),
            other => Err(Error::InvalidInput(format!(
                "unknown token status '{}'",
                other
            ))),
        }
    }
}

/// Whether the token was paid for up front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPaymentStatus {
    Pending,
    Paid,
}

impl TokenPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPaymentStatus::Pending => "pending",
            TokenPaymentStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for TokenPaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(TokenPaymentStatus::Pending),
            "paid" => Ok(TokenPaymentStatus::Paid),
            other => Err(Error::InvalidInput(format!(
                "unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// A redemption token for one meal
///
/// The price breakdown (`rate`, `special_rate`) is captured at issuance;
/// later rate-table edits never re-price an outstanding token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealToken {
    pub id: Uuid,
    /// Opaque unguessable code handed to the presentation layer
    pub code: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub meal_type: MealType,
    pub specials: u32,
    pub rate: i64,
    pub special_rate: i64,
    /// rate + special_rate
    pub amount: i64,
    pub status: TokenStatus,
    pub payment_status: TokenPaymentStatus,
    pub generated_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl MealToken {
    pub fn new(
        user_id: Uuid,
        organization_id: Uuid,
        meal_type: MealType,
        specials: u32,
        rate: i64,
        special_rate: i64,
        payment_status: TokenPaymentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: mint_code(),
            user_id,
            organization_id,
            meal_type,
            specials,
            rate,
            special_rate,
            amount: rate + special_rate,
            status: TokenStatus::Active,
            payment_status,
            generated_at: now,
            used_at: None,
            expires_at: now + chrono::Duration::hours(TOKEN_VALIDITY_HOURS),
        }
    }

    /// Whether the redemption window has closed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Mint an opaque token code: 24 random bytes, URL-safe base64
pub fn mint_code() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}
