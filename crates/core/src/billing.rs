//! Monthly bill computation
//!
//! The tally itself is a pure function of (meals, rates, category,
//! month), so the fee rules are testable without a live store. The
//! service wraps it with the month scan and the idempotent upsert.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants;
use crate::models::{
    Bill, BillPaymentStatus, Category, Meal, MealCounts, MealLine, MealType, RateTable, User,
};
use crate::permissions::{MessAction, PermissionMatrix};
use crate::storage::Database;

/// Months that close a semester and may carry the hostel fee
const SEMESTER_END_MONTHS: [u32; 2] = [6, 12];

/// A calendar month for billing purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub month: u32,
    pub year: i32,
}

impl BillingPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!("invalid month {}", month)));
        }
        if !(1970..=9999).contains(&year) {
            return Err(Error::InvalidInput(format!("invalid year {}", year)));
        }
        Ok(Self { month, year })
    }

    /// The period containing the given instant
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            month: at.month(),
            year: at.year(),
        }
    }

    pub fn is_semester_end(&self) -> bool {
        SEMESTER_END_MONTHS.contains(&self.month)
    }

    /// Half-open window [first instant of month, first instant of next month)
    pub fn range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let start = month_start(self.year, self.month)?;
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let end = month_start(next_year, next_month)?;
        Ok((start, end))
    }
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| Error::InvalidInput(format!("invalid period {}-{}", year, month)))
}

/// Derived figures for one user-month
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillTotals {
    pub meal_count: MealCounts,
    pub special_count: u32,
    pub subtotal: i64,
    pub semester_hostel_fee: i64,
    pub is_semester_fee_applied: bool,
    pub total: i64,
}

/// Tally one month of meals and apply the semester-fee rule
///
/// In June and December the fee is charged to General/OBC students and
/// waived for SC/ST/PwD; the applied flag records that the rule was
/// evaluated either way.
pub fn tally_month(meals: &[Meal], rates: &RateTable, category: Category, month: u32) -> BillTotals {
    let mut meal_count = MealCounts::default();
    let mut special_count = 0u32;
    let mut subtotal = 0i64;

    for meal in meals {
        match meal.meal_type {
            MealType::Breakfast => meal_count.breakfast += 1,
            MealType::Lunch => meal_count.lunch += 1,
            MealType::Dinner => meal_count.dinner += 1,
        }
        special_count += meal.specials;
        subtotal += meal.total_amount;
    }

    let semester_end = SEMESTER_END_MONTHS.contains(&month);
    let (semester_hostel_fee, is_semester_fee_applied) = if semester_end {
        if category.is_fee_exempt() {
            (0, true)
        } else {
            (rates.semester_hostel_fee, true)
        }
    } else {
        (0, false)
    };

    BillTotals {
        meal_count,
        special_count,
        subtotal,
        semester_hostel_fee,
        is_semester_fee_applied,
        total: subtotal + semester_hostel_fee,
    }
}

/// Generates and serves monthly bills
pub struct BillingService<'a> {
    db: &'a Database,
}

impl<'a> BillingService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Compute (or recompute) the bill for one user-month
    ///
    /// Idempotent. Regeneration overwrites the meal snapshot and all
    /// derived totals, preserves the payment history, and re-derives
    /// due amount and settlement status from it.
    #[instrument(skip(self))]
    pub fn generate(&self, user_id: Uuid, month: u32, year: i32) -> Result<Bill> {
        let period = BillingPeriod::new(month, year)?;

        let user = self
            .db
            .users()
            .find_by_id(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        let org_id = user
            .organization_id
            .ok_or_else(|| Error::NotFound(format!("organization for user {}", user_id)))?;
        let org = self
            .db
            .organizations()
            .find_by_id(org_id)?
            .ok_or_else(|| Error::NotFound(format!("organization {}", org_id)))?;

        let (start, end) = period.range()?;
        let meals = self.db.meals().list_for_user_between(user_id, start, end)?;
        let totals = tally_month(&meals, &org.rates, user.category, period.month);
        let lines: Vec<MealLine> = meals.iter().map(MealLine::from).collect();
        let now = Utc::now();

        let bill = match self.db.bills().find_for_period(user_id, month, year)? {
            Some(mut bill) => {
                bill.meals = lines;
                bill.meal_count = totals.meal_count;
                bill.special_count = totals.special_count;
                bill.subtotal = totals.subtotal;
                bill.semester_hostel_fee = totals.semester_hostel_fee;
                bill.total = totals.total;
                bill.category = user.category;
                bill.is_semester_fee_applied = totals.is_semester_fee_applied;
                bill.reconcile(now);
                self.db.bills().update(&bill)?;
                bill
            }
            None => {
                let bill = Bill {
                    id: Uuid::new_v4(),
                    user_id,
                    organization_id: org.id,
                    month: period.month,
                    year: period.year,
                    meals: lines,
                    meal_count: totals.meal_count,
                    special_count: totals.special_count,
                    subtotal: totals.subtotal,
                    semester_hostel_fee: totals.semester_hostel_fee,
                    total: totals.total,
                    category: user.category,
                    is_semester_fee_applied: totals.is_semester_fee_applied,
                    payment_status: BillPaymentStatus::Pending,
                    payment_history: Vec::new(),
                    due_amount: totals.total,
                    generated_at: now,
                    paid_at: None,
                };
                self.db.bills().create(&bill)?;
                bill
            }
        };

        invariants::assert_bill_invariants(&bill);

        info!(
            bill_id = %bill.id,
            total = bill.total,
            meal_count = bill.meal_count.total(),
            "Generated bill"
        );

        Ok(bill)
    }

    /// The bill for the month containing now, generated on demand
    pub fn current(&self, user_id: Uuid) -> Result<Bill> {
        let period = BillingPeriod::containing(Utc::now());
        match self
            .db
            .bills()
            .find_for_period(user_id, period.month, period.year)?
        {
            Some(bill) => Ok(bill),
            None => self.generate(user_id, period.month, period.year),
        }
    }

    /// A user's bills, newest first
    pub fn bills_for_user(&self, user_id: Uuid) -> Result<Vec<Bill>> {
        self.db.bills().list_for_user(user_id)
    }

    /// Admin/organization view over all bills, optionally one period
    pub fn all_bills(&self, actor: &User, period: Option<(u32, i32)>) -> Result<Vec<Bill>> {
        if !PermissionMatrix::can_perform(actor.role, MessAction::ViewAllBills) {
            return Err(Error::PermissionDenied(
                "viewing all bills requires an admin or organization account".to_string(),
            ));
        }
        if let Some((month, year)) = period {
            BillingPeriod::new(month, year)?;
        }
        self.db.bills().list_all(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Organization, Payment, Role};
    use crate::storage::Database;

    fn rates() -> RateTable {
        RateTable {
            breakfast_rate: 50,
            lunch_rate: 100,
            dinner_rate: 100,
            special_item_rate: 30,
            semester_hostel_fee: 500,
            basic_monthly_charge: 2000,
        }
    }

    fn meal(user_id: Uuid, org_id: Uuid, meal_type: MealType, amount: i64, specials: u32) -> Meal {
        Meal {
            id: Uuid::new_v4(),
            user_id,
            organization_id: org_id,
            meal_type,
            specials,
            token_id: None,
            rate: amount - i64::from(specials) * 30,
            special_rate: i64::from(specials) * 30,
            total_amount: amount,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_tally_counts_and_subtotal() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let meals = vec![
            meal(user_id, org_id, MealType::Breakfast, 50, 0),
            meal(user_id, org_id, MealType::Lunch, 160, 2),
            meal(user_id, org_id, MealType::Dinner, 100, 0),
        ];

        let totals = tally_month(&meals, &rates(), Category::General, 3);

        assert_eq!(totals.meal_count.breakfast, 1);
        assert_eq!(totals.meal_count.lunch, 1);
        assert_eq!(totals.meal_count.dinner, 1);
        assert_eq!(totals.special_count, 2);
        assert_eq!(totals.subtotal, 310);
        assert_eq!(totals.semester_hostel_fee, 0);
        assert!(!totals.is_semester_fee_applied);
        assert_eq!(totals.total, 310);
    }

    #[test]
    fn test_tally_semester_fee_general() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let meals = vec![
            meal(user_id, org_id, MealType::Lunch, 150, 0),
            meal(user_id, org_id, MealType::Lunch, 150, 0),
            meal(user_id, org_id, MealType::Dinner, 150, 0),
        ];

        let totals = tally_month(&meals, &rates(), Category::General, 6);

        assert_eq!(totals.subtotal, 450);
        assert_eq!(totals.semester_hostel_fee, 500);
        assert!(totals.is_semester_fee_applied);
        assert_eq!(totals.total, 950);
    }

    #[test]
    fn test_tally_semester_fee_waived_for_exempt_categories() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let meals = vec![
            meal(user_id, org_id, MealType::Lunch, 150, 0),
            meal(user_id, org_id, MealType::Lunch, 150, 0),
            meal(user_id, org_id, MealType::Dinner, 150, 0),
        ];

        for category in [Category::Sc, Category::St, Category::Pwd] {
            let totals = tally_month(&meals, &rates(), category, 6);
            assert_eq!(totals.semester_hostel_fee, 0);
            // Flag still set: the rule was evaluated, the fee waived
            assert!(totals.is_semester_fee_applied);
            assert_eq!(totals.total, 450);
        }
    }

    #[test]
    fn test_tally_december_counts_as_semester_end() {
        let totals = tally_month(&[], &rates(), Category::Obc, 12);
        assert_eq!(totals.semester_hostel_fee, 500);
        assert!(totals.is_semester_fee_applied);
        assert_eq!(totals.total, 500);
    }

    #[test]
    fn test_period_validation_and_range() {
        assert!(BillingPeriod::new(0, 2025).is_err());
        assert!(BillingPeriod::new(13, 2025).is_err());

        let june = BillingPeriod::new(6, 2025).unwrap();
        let (start, end) = june.range().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());

        // December rolls into the next year
        let december = BillingPeriod::new(12, 2025).unwrap();
        let (_, end) = december.range().unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    fn setup() -> (Database, Organization, User) {
        let db = Database::open_in_memory().unwrap();
        let org = Organization::new(
            "North Mess".to_string(),
            "north@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_rates(rates());
        db.organizations().create(&org).unwrap();

        let user = User::new(
            "Asha".to_string(),
            "asha@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_organization(org.id);
        db.users().create(&user).unwrap();

        (db, org, user)
    }

    fn june_meal(db: &Database, user: &User, org: &Organization, day: u32, amount: i64) {
        let mut m = meal(user.id, org.id, MealType::Lunch, amount, 0);
        m.timestamp = Utc.with_ymd_and_hms(2025, 6, day, 12, 30, 0).unwrap();
        db.meals().create(&m).unwrap();
    }

    #[test]
    fn test_generate_creates_bill_with_snapshot() {
        let (db, org, user) = setup();
        june_meal(&db, &user, &org, 2, 150);
        june_meal(&db, &user, &org, 3, 150);
        june_meal(&db, &user, &org, 4, 150);

        // A May meal must not leak into the June window
        let mut stray = meal(user.id, org.id, MealType::Dinner, 100, 0);
        stray.timestamp = Utc.with_ymd_and_hms(2025, 5, 31, 20, 0, 0).unwrap();
        db.meals().create(&stray).unwrap();

        let bill = BillingService::new(&db).generate(user.id, 6, 2025).unwrap();

        assert_eq!(bill.meals.len(), 3);
        assert_eq!(bill.subtotal, 450);
        assert_eq!(bill.semester_hostel_fee, 500);
        assert_eq!(bill.total, 950);
        assert_eq!(bill.due_amount, 950);
        assert_eq!(bill.payment_status, BillPaymentStatus::Pending);
        assert!(bill.is_semester_fee_applied);
    }

    #[test]
    fn test_generate_is_idempotent() {
        let (db, org, user) = setup();
        june_meal(&db, &user, &org, 2, 150);

        let service = BillingService::new(&db);
        let first = service.generate(user.id, 6, 2025).unwrap();
        let second = service.generate(user.id, 6, 2025).unwrap();

        // Same bill row, same totals
        assert_eq!(first.id, second.id);
        assert_eq!(first.total, second.total);
        assert_eq!(db.bills().list_for_user(user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_regenerate_preserves_payments_and_refreshes_due() {
        let (db, org, user) = setup();
        june_meal(&db, &user, &org, 2, 150);

        let service = BillingService::new(&db);
        let mut bill = service.generate(user.id, 6, 2025).unwrap();
        assert_eq!(bill.total, 650);

        bill.payment_history.push(Payment {
            amount: 200,
            date: Utc::now(),
            method: "cash".to_string(),
        });
        bill.reconcile(Utc::now());
        db.bills().update(&bill).unwrap();

        // Another meal lands in the window, then the bill is regenerated
        june_meal(&db, &user, &org, 10, 150);
        let regenerated = service.generate(user.id, 6, 2025).unwrap();

        assert_eq!(regenerated.total, 800);
        assert_eq!(regenerated.payment_history.len(), 1);
        assert_eq!(regenerated.due_amount, 600);
        assert_eq!(regenerated.payment_status, BillPaymentStatus::Partial);
    }

    #[test]
    fn test_current_generates_once() {
        let (db, _org, user) = setup();
        let service = BillingService::new(&db);

        let first = service.current(user.id).unwrap();
        let second = service.current(user.id).unwrap();
        assert_eq!(first.id, second.id);

        let now = Utc::now();
        assert_eq!(first.month, now.month());
        assert_eq!(first.year, now.year());
    }

    #[test]
    fn test_all_bills_requires_privileged_role() {
        let (db, org, user) = setup();
        let service = BillingService::new(&db);
        service.generate(user.id, 6, 2025).unwrap();

        let result = service.all_bills(&user, None);
        assert!(matches!(result, Err(Error::PermissionDenied(_))));

        let admin = User::new(
            "Warden".to_string(),
            "warden@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_role(Role::Admin)
        .with_organization(org.id);
        db.users().create(&admin).unwrap();

        let bills = service.all_bills(&admin, Some((6, 2025))).unwrap();
        assert_eq!(bills.len(), 1);
        assert!(service.all_bills(&admin, Some((7, 2025))).unwrap().is_empty());
    }
}
