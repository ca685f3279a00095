//! Monthly bill model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

use super::{Category, Meal, MealType};

/// Settlement state of a bill against its payment history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillPaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl BillPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillPaymentStatus::Pending => "pending",
            BillPaymentStatus::Partial => "partial",
            BillPaymentStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for BillPaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(BillPaymentStatus::Pending),
            "partial" => Ok(BillPaymentStatus::Partial),
            "paid" => Ok(BillPaymentStatus::Paid),
            other => Err(Error::InvalidInput(format!(
                "unknown bill payment status '{}'",
                other
            ))),
        }
    }
}

/// One meal as embedded in a bill's snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealLine {
    pub date: DateTime<Utc>,
    pub meal_type: MealType,
    pub specials: u32,
    pub amount: i64,
}

impl From<&Meal> for MealLine {
    fn from(meal: &Meal) -> Self {
        Self {
            date: meal.timestamp,
            meal_type: meal.meal_type,
            specials: meal.specials,
            amount: meal.total_amount,
        }
    }
}

/// Per-type meal counts for a billing period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealCounts {
    pub breakfast: u32,
    pub lunch: u32,
    pub dinner: u32,
}

impl MealCounts {
    pub fn total(&self) -> u32 {
        self.breakfast + self.lunch + self.dinner
    }
}

/// A payment recorded against a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub amount: i64,
    pub date: DateTime<Utc>,
    pub method: String,
}

/// The monthly aggregate of a user's meals, reconciled against payments
///
/// One bill exists per (user, month, year). Regeneration overwrites the
/// meal snapshot and derived totals; the payment history is preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub meals: Vec<MealLine>,
    pub meal_count: MealCounts,
    pub special_count: u32,
    pub subtotal: i64,
    pub semester_hostel_fee: i64,
    /// subtotal + semester_hostel_fee
    pub total: i64,
    /// User's category at generation time
    pub category: Category,
    /// Set whenever the semester rule was evaluated, even if the fee was waived
    pub is_semester_fee_applied: bool,
    pub payment_status: BillPaymentStatus,
    pub payment_history: Vec<Payment>,
    /// total - sum(payment_history); negative on overpayment
    pub due_amount: i64,
    pub generated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Bill {
    pub fn total_paid(&self) -> i64 {
        self.payment_history.iter().map(|p| p.amount).sum()
    }

    /// Re-derive due amount, settlement status, and paid time from the
    /// full payment history. Called after every payment and after every
    /// regeneration that changes the total.
    pub fn reconcile(&mut self, now: DateTime<Utc>) {
        let paid = self.total_paid();
        self.due_amount = self.total - paid;

        if paid >= self.total && !self.payment_history.is_empty() {
            self.payment_status = BillPaymentStatus::Paid;
            if self.paid_at.is_none() {
                self.paid_at = Some(now);
            }
        } else if paid > 0 {
            self.payment_status = BillPaymentStatus::Partial;
            self.paid_at = None;
        } else {
            self.payment_status = BillPaymentStatus::Pending;
            self.paid_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bill(total: i64) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            month: 3,
            year: 2025,
            meals: Vec::new(),
            meal_count: MealCounts::default(),
            special_count: 0,
            subtotal: total,
            semester_hostel_fee: 0,
            total,
            category: Category::General,
            is_semester_fee_applied: false,
            payment_status: BillPaymentStatus::Pending,
            payment_history: Vec::new(),
            due_amount: total,
            generated_at: Utc::now(),
            paid_at: None,
        }
    }

    #[test]
    fn test_reconcile_partial_then_paid() {
        let mut bill = make_bill(950);
        let now = Utc::now();

        bill.payment_history.push(Payment {
            amount: 300,
            date: now,
            method: "cash".into(),
        });
        bill.reconcile(now);
        assert_eq!(bill.payment_status, BillPaymentStatus::Partial);
        assert_eq!(bill.due_amount, 650);
        assert!(bill.paid_at.is_none());

        bill.payment_history.push(Payment {
            amount: 650,
            date: now,
            method: "upi".into(),
        });
        bill.reconcile(now);
        assert_eq!(bill.payment_status, BillPaymentStatus::Paid);
        assert_eq!(bill.due_amount, 0);
        assert!(bill.paid_at.is_some());
    }

    #[test]
    fn test_reconcile_overpayment_goes_negative() {
        let mut bill = make_bill(100);
        let now = Utc::now();

        bill.payment_history.push(Payment {
            amount: 150,
            date: now,
            method: "cash".into(),
        });
        bill.reconcile(now);
        assert_eq!(bill.payment_status, BillPaymentStatus::Paid);
        assert_eq!(bill.due_amount, -50);
    }

    #[test]
    fn test_reconcile_no_payments_stays_pending() {
        let mut bill = make_bill(450);
        bill.reconcile(Utc::now());
        assert_eq!(bill.payment_status, BillPaymentStatus::Pending);
        assert_eq!(bill.due_amount, 450);
    }
}
