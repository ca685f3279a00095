//! Bill storage operations
//!
//! The embedded meal snapshot and payment history are stored as JSON
//! TEXT columns; derived totals live in their own columns so the admin
//! views can filter without decoding JSON.

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    parse_datetime, parse_datetime_opt, parse_enum, parse_json, parse_uuid, OptionalExt,
};
use crate::error::Result;
use crate::models::{Bill, MealCounts};

const BILL_COLUMNS: &str = "id, user_id, organization_id, month, year, meals_json, \
     breakfast_count, lunch_count, dinner_count, special_count, subtotal, semester_hostel_fee, \
     total, category, is_semester_fee_applied, payment_status, payment_history_json, \
     due_amount, generated_at, paid_at";

fn map_bill(row: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
        organization_id: parse_uuid(&row.get::<_, String>(2)?)?,
        month: row.get(3)?,
        year: row.get(4)?,
        meals: parse_json(&row.get::<_, String>(5)?)?,
        meal_count: MealCounts {
            breakfast: row.get(6)?,
            lunch: row.get(7)?,
            dinner: row.get(8)?,
        },
        special_count: row.get(9)?,
        subtotal: row.get(10)?,
        semester_hostel_fee: row.get(11)?,
        total: row.get(12)?,
        category: parse_enum(&row.get::<_, String>(13)?)?,
        is_semester_fee_applied: row.get::<_, i32>(14)? != 0,
        payment_status: parse_enum(&row.get::<_, String>(15)?)?,
        payment_history: parse_json(&row.get::<_, String>(16)?)?,
        due_amount: row.get(17)?,
        generated_at: parse_datetime(&row.get::<_, String>(18)?)?,
        paid_at: parse_datetime_opt(row.get::<_, Option<String>>(19)?)?,
    })
}

pub struct BillStore<'a> {
    conn: &'a Connection,
}

impl<'a> BillStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new bill
    #[instrument(skip(self, bill), fields(user_id = %bill.user_id, month = bill.month, year = bill.year))]
    pub fn create(&self, bill: &Bill) -> Result<()> {
        let meals_json = serde_json::to_string(&bill.meals)?;
        let history_json = serde_json::to_string(&bill.payment_history)?;

        self.conn.execute(
            "INSERT INTO bills (id, user_id, organization_id, month, year, meals_json, \
             breakfast_count, lunch_count, dinner_count, special_count, subtotal, \
             semester_hostel_fee, total, category, is_semester_fee_applied, payment_status, \
             payment_history_json, due_amount, generated_at, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                bill.id.to_string(),
                bill.user_id.to_string(),
                bill.organization_id.to_string(),
                bill.month,
                bill.year,
                meals_json,
                bill.meal_count.breakfast,
                bill.meal_count.lunch,
                bill.meal_count.dinner,
                bill.special_count,
                bill.subtotal,
                bill.semester_hostel_fee,
                bill.total,
                bill.category.as_str(),
                bill.is_semester_fee_applied as i32,
                bill.payment_status.as_str(),
                history_json,
                bill.due_amount,
                bill.generated_at.to_rfc3339(),
                bill.paid_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Rewrite a bill's snapshot, derived totals, and payment state
    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    pub fn update(&self, bill: &Bill) -> Result<()> {
        let meals_json = serde_json::to_string(&bill.meals)?;
        let history_json = serde_json::to_string(&bill.payment_history)?;

        self.conn.execute(
            "UPDATE bills SET meals_json = ?1, breakfast_count = ?2, lunch_count = ?3, \
             dinner_count = ?4, special_count = ?5, subtotal = ?6, semester_hostel_fee = ?7, \
             total = ?8, category = ?9, is_semester_fee_applied = ?10, payment_status = ?11, \
             payment_history_json = ?12, due_amount = ?13, paid_at = ?14 WHERE id = ?15",
            params![
                meals_json,
                bill.meal_count.breakfast,
                bill.meal_count.lunch,
                bill.meal_count.dinner,
                bill.special_count,
                bill.subtotal,
                bill.semester_hostel_fee,
                bill.total,
                bill.category.as_str(),
                bill.is_semester_fee_applied as i32,
                bill.payment_status.as_str(),
                history_json,
                bill.due_amount,
                bill.paid_at.map(|t| t.to_rfc3339()),
                bill.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Find bill by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bills WHERE id = ?1",
            BILL_COLUMNS
        ))?;

        let bill = stmt
            .query_row(params![id.to_string()], map_bill)
            .optional()?;

        Ok(bill)
    }

    /// Find the unique bill for (user, month, year)
    #[instrument(skip(self))]
    pub fn find_for_period(&self, user_id: Uuid, month: u32, year: i32) -> Result<Option<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bills WHERE user_id = ?1 AND month = ?2 AND year = ?3",
            BILL_COLUMNS
        ))?;

        let bill = stmt
            .query_row(params![user_id.to_string(), month, year], map_bill)
            .optional()?;

        Ok(bill)
    }

    /// List a user's bills, newest first
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bills WHERE user_id = ?1 ORDER BY generated_at DESC",
            BILL_COLUMNS
        ))?;

        let bills = stmt
            .query_map(params![user_id.to_string()], map_bill)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bills)
    }

    /// List all bills, optionally restricted to one period, newest first
    pub fn list_all(&self, period: Option<(u32, i32)>) -> Result<Vec<Bill>> {
        let bills = match period {
            Some((month, year)) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM bills WHERE month = ?1 AND year = ?2 \
                     ORDER BY generated_at DESC",
                    BILL_COLUMNS
                ))?;
                let bills = stmt
                    .query_map(params![month, year], map_bill)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                bills
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM bills ORDER BY generated_at DESC",
                    BILL_COLUMNS
                ))?;
                let bills = stmt
                    .query_map([], map_bill)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                bills
            }
        };

        Ok(bills)
    }
}
