//! Meal record model - the durable billing unit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

use super::MealToken;

/// The three meals of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl std::str::FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(Error::InvalidInput(format!("unknown meal type '{}'", other))),
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A served meal, created when a token is redeemed
///
/// Tokens are ephemeral; meals are permanent. The price breakdown is
/// copied from the token's issuance-time capture and never re-priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub meal_type: MealType,
    pub specials: u32,
    /// Back-reference to the redeemed token
    pub token_id: Option<Uuid>,
    /// Base meal price at issuance time
    pub rate: i64,
    /// Specials surcharge at issuance time
    pub special_rate: i64,
    pub total_amount: i64,
    pub timestamp: DateTime<Utc>,
}

impl Meal {
    /// Build the meal record for a redeemed token
    pub fn from_token(token: &MealToken, served_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            organization_id: token.organization_id,
            meal_type: token.meal_type,
            specials: token.specials,
            token_id: Some(token.id),
            rate: token.rate,
            special_rate: token.special_rate,
            total_amount: token.amount,
            timestamp: served_at,
        }
    }
}

/// Aggregate meal figures for one user and month
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealStats {
    pub total_meals: u32,
    pub breakfast: u32,
    pub lunch: u32,
    pub dinner: u32,
    pub total_specials: u32,
    pub total_amount: i64,
}

impl MealStats {
    pub fn tally(meals: &[Meal]) -> Self {
        let mut stats = MealStats::default();
        for meal in meals {
            stats.total_meals += 1;
            match meal.meal_type {
                MealType::Breakfast => stats.breakfast += 1,
                MealType::Lunch => stats.lunch += 1,
                MealType::Dinner => stats.dinner += 1,
            }
            stats.total_specials += meal.specials;
            stats.total_amount += meal.total_amount;
        }
        stats
    }
}
