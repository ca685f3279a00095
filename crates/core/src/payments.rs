//! Payment ledger
//!
//! Appends payments to a bill and re-derives the settlement state from
//! the full history on every call.

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants;
use crate::models::{Bill, Payment};
use crate::storage::Database;

/// Records payments against bills
pub struct PaymentService<'a> {
    db: &'a Database,
}

impl<'a> PaymentService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a payment against a bill
    ///
    /// Amounts must be positive; there is no upper bound, so an
    /// overpayment drives the due amount negative rather than being
    /// rejected here.
    #[instrument(skip(self, method))]
    pub fn record(&self, bill_id: Uuid, amount: i64, method: &str) -> Result<Bill> {
        if amount <= 0 {
            return Err(Error::InvalidInput(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let mut bill = self
            .db
            .bills()
            .find_by_id(bill_id)?
            .ok_or_else(|| Error::NotFound(format!("bill {}", bill_id)))?;

        let now = Utc::now();
        bill.payment_history.push(Payment {
            amount,
            date: now,
            method: method.to_string(),
        });
        bill.reconcile(now);
        invariants::assert_bill_invariants(&bill);

        self.db.bills().update(&bill)?;

        info!(
            bill_id = %bill.id,
            amount,
            due = bill.due_amount,
            status = bill.payment_status.as_str(),
            "Recorded payment"
        );

        Ok(bill)
    }
}
