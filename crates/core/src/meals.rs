//! Meal history and statistics

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::billing::BillingPeriod;
use crate::error::{Error, Result};
use crate::models::{Meal, MealStats, User};
use crate::permissions::{MessAction, PermissionMatrix};
use crate::storage::Database;

/// Serves meal history views
pub struct MealService<'a> {
    db: &'a Database,
}

impl<'a> MealService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// A user's meal history, optionally limited to [from, to)
    pub fn history(
        &self,
        user_id: Uuid,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Meal>> {
        match range {
            Some((from, to)) => self.db.meals().list_for_user_between(user_id, from, to),
            None => self.db.meals().list_for_user(user_id),
        }
    }

    /// Every meal served on one day, across all students (operator view)
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn on_day(&self, actor: &User, day: NaiveDate) -> Result<Vec<Meal>> {
        if !PermissionMatrix::can_perform(actor.role, MessAction::ViewDailyMeals) {
            return Err(Error::PermissionDenied(
                "daily meal listing requires an admin or organization account".to_string(),
            ));
        }

        let start = day.and_time(NaiveTime::MIN).and_utc();
        let next = day
            .succ_opt()
            .ok_or_else(|| Error::InvalidInput(format!("date {} out of range", day)))?;
        let end = next.and_time(NaiveTime::MIN).and_utc();

        self.db.meals().list_between(start, end)
    }

    /// Per-type counts and totals for one user-month
    pub fn month_stats(&self, user_id: Uuid, month: u32, year: i32) -> Result<MealStats> {
        let period = BillingPeriod::new(month, year)?;
        let (start, end) = period.range()?;
        let meals = self.db.meals().list_for_user_between(user_id, start, end)?;
        Ok(MealStats::tally(&meals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MealType, Organization, Role, User};
    use chrono::TimeZone;

    fn setup() -> (Database, Organization, User) {
        let db = Database::open_in_memory().unwrap();
        let org = Organization::new(
            "North Mess".to_string(),
            "north@campus.test".to_string(),
            "hash".to_string(),
        );
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

    fn served_meal(
        db: &Database,
        user: &User,
        org: &Organization,
        meal_type: MealType,
        amount: i64,
        at: DateTime<Utc>,
    ) {
        let meal = Meal {
            id: Uuid::new_v4(),
            user_id: user.id,
            organization_id: org.id,
            meal_type,
            specials: 0,
            token_id: None,
            rate: amount,
            special_rate: 0,
            total_amount: amount,
            timestamp: at,
        };
        db.meals().create(&meal).unwrap();
    }

    #[test]
    fn test_history_full_and_ranged() {
        let (db, org, user) = setup();
        let service = MealService::new(&db);

        let march = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2025, 4, 2, 13, 0, 0).unwrap();
        served_meal(&db, &user, &org, MealType::Breakfast, 50, march);
        served_meal(&db, &user, &org, MealType::Lunch, 100, april);

        assert_eq!(service.history(user.id, None).unwrap().len(), 2);

        let april_start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let may_start = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let ranged = service
            .history(user.id, Some((april_start, may_start)))
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].meal_type, MealType::Lunch);
    }

    #[test]
    fn test_on_day_is_operator_only() {
        let (db, org, user) = setup();
        let service = MealService::new(&db);

        let lunchtime = Utc.with_ymd_and_hms(2025, 4, 2, 13, 0, 0).unwrap();
        served_meal(&db, &user, &org, MealType::Lunch, 100, lunchtime);

        let day = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        assert!(matches!(
            service.on_day(&user, day),
            Err(Error::PermissionDenied(_))
        ));

        let admin = User::new(
            "Warden".to_string(),
            "warden@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_role(Role::Admin);
        db.users().create(&admin).unwrap();

        let meals = service.on_day(&admin, day).unwrap();
        assert_eq!(meals.len(), 1);

        let empty_day = NaiveDate::from_ymd_opt(2025, 4, 3).unwrap();
        assert!(service.on_day(&admin, empty_day).unwrap().is_empty());
    }

    #[test]
    fn test_month_stats() {
        let (db, org, user) = setup();
        let service = MealService::new(&db);

        for day in [1, 2] {
            let at = Utc.with_ymd_and_hms(2025, 4, day, 8, 0, 0).unwrap();
            served_meal(&db, &user, &org, MealType::Breakfast, 50, at);
        }
        let at = Utc.with_ymd_and_hms(2025, 4, 2, 13, 0, 0).unwrap();
        served_meal(&db, &user, &org, MealType::Lunch, 160, at);

        let stats = service.month_stats(user.id, 4, 2025).unwrap();
        assert_eq!(stats.total_meals, 3);
        assert_eq!(stats.breakfast, 2);
        assert_eq!(stats.lunch, 1);
        assert_eq!(stats.dinner, 0);
        assert_eq!(stats.total_amount, 260);

        assert!(service.month_stats(user.id, 13, 2025).is_err());
    }
}
