//! Organization model and rate table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MealType;

/// Per-organization meal pricing and fees
///
/// Read-only to everything except the organization's own admin. Billing
/// and token issuance take this as an explicit value, never a live lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTable {
    pub breakfast_rate: i64,
    pub lunch_rate: i64,
    pub dinner_rate: i64,
    pub special_item_rate: i64,
    pub semester_hostel_fee: i64,
    /// Flat monthly charge; carried in the table but not part of meal billing
    pub basic_monthly_charge: i64,
}

impl RateTable {
    /// Base price for one meal of the given type
    pub fn rate_for(&self, meal_type: MealType) -> i64 {
        match meal_type {
            MealType::Breakfast => self.breakfast_rate,
            MealType::Lunch => self.lunch_rate,
            MealType::Dinner => self.dinner_rate,
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        // Standard rates applied to a newly enrolled organization
        Self {
            breakfast_rate: 50,
            lunch_rate: 100,
            dinner_rate: 100,
            special_item_rate: 30,
            semester_hostel_fee: 500,
            basic_monthly_charge: 2000,
        }
    }
}

/// A tenant mess organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub rates: RateTable,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            address: None,
            rates: RateTable::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_address(mut self, address: String) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }
}
