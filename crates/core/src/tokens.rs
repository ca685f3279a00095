//! Token lifecycle: issuance, validation, redemption
//!
//! A token moves active -> used or active -> expired, exactly once.
//! Redemption and the meal record it produces commit in one transaction.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::invariants;
use crate::models::{
    Category, Meal, MealToken, MealType, TokenPaymentStatus, TokenStatus, User, MAX_SPECIALS,
};
use crate::storage::{Database, MealStore, TokenStore};

/// Holder details shown to the operator on scan
#[derive(Debug, Clone)]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
    pub student_no: Option<String>,
    pub category: Category,
}

impl From<&User> for StudentSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            student_no: user.student_no.clone(),
            category: user.category,
        }
    }
}

/// Confirmation returned for a successful redemption
#[derive(Debug, Clone)]
pub struct RedeemReceipt {
    pub student: StudentSummary,
    pub meal_type: MealType,
    pub specials: u32,
    pub amount: i64,
}

/// Token plus holder details for a non-mutating code lookup
#[derive(Debug, Clone)]
pub struct TokenLookup {
    pub token: MealToken,
    pub student: StudentSummary,
}

/// Why a token could not be issued
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("card is not active")]
    CardInactive,

    #[error("specials count {given} is out of range (0-10)")]
    InvalidSpecials { given: u32 },

    #[error(transparent)]
    Storage(#[from] Error),
}

/// Why a scanned code could not be redeemed
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("token not found")]
    NotFound,

    #[error("token already used for {meal_type}")]
    AlreadyUsed {
        student: StudentSummary,
        meal_type: MealType,
        used_at: Option<DateTime<Utc>>,
    },

    #[error("token expired at {expires_at}")]
    Expired { expires_at: DateTime<Utc> },

    #[error("card is not active")]
    CardInactive,

    #[error("token was claimed by a concurrent scan")]
    Conflict,

    #[error(transparent)]
    Storage(#[from] Error),
}

/// Issues and redeems meal tokens
pub struct TokenService<'a> {
    db: &'a Database,
}

impl<'a> TokenService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Issue a token for one meal
    ///
    /// The price breakdown is captured here, from the organization's
    /// current rate table; later rate edits never re-price the token.
    #[instrument(skip(self))]
    pub fn issue(
        &self,
        user_id: Uuid,
        meal_type: MealType,
        specials: u32,
        pay_now: bool,
    ) -> Result<MealToken, IssueError> {
        let user = self
            .db
            .users()
            .find_by_id(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;

        if !user.is_card_active {
            return Err(IssueError::CardInactive);
        }

        if specials > MAX_SPECIALS {
            return Err(IssueError::InvalidSpecials { given: specials });
        }

        let org_id = user
            .organization_id
            .ok_or_else(|| Error::NotFound(format!("organization for user {}", user_id)))?;
        let org = self
            .db
            .organizations()
            .find_by_id(org_id)?
            .ok_or_else(|| Error::NotFound(format!("organization {}", org_id)))?;

        let rate = org.rates.rate_for(meal_type);
        let special_rate = i64::from(specials) * org.rates.special_item_rate;
        let payment_status = if pay_now {
            TokenPaymentStatus::Paid
        } else {
            TokenPaymentStatus::Pending
        };

        let token = MealToken::new(
            user.id,
            org.id,
            meal_type,
            specials,
            rate,
            special_rate,
            payment_status,
        );
        invariants::assert_token_invariants(&token);

        self.db.meal_tokens().create(&token)?;

        info!(
            token_id = %token.id,
            %meal_type,
            amount = token.amount,
            "Issued meal token"
        );

        Ok(token)
    }

    /// Validate a scanned code and redeem the token
    ///
    /// On success the token is marked used and the meal is recorded,
    /// committed together. The persisted status is the single source of
    /// truth for at-most-one redemption.
    #[instrument(skip(self, code))]
    pub fn validate(&self, code: &str) -> Result<RedeemReceipt, RedeemError> {
        let token = self
            .db
            .meal_tokens()
            .find_by_code(code)?
            .ok_or(RedeemError::NotFound)?;

        let holder = self
            .db
            .users()
            .find_by_id(token.user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", token.user_id)))?;

        if token.status == TokenStatus::Used {
            return Err(RedeemError::AlreadyUsed {
                student: StudentSummary::from(&holder),
                meal_type: token.meal_type,
                used_at: token.used_at,
            });
        }

        let now = Utc::now();
        if token.status == TokenStatus::Expired || token.is_expired_at(now) {
            // Lazy expiry: persist the terminal state on first sight
            if token.status == TokenStatus::Active {
                self.db.meal_tokens().mark_expired(token.id)?;
            }
            return Err(RedeemError::Expired {
                expires_at: token.expires_at,
            });
        }

        // Leaves the token active so redemption can be retried once the
        // card is reactivated
        if !holder.is_card_active {
            return Err(RedeemError::CardInactive);
        }

        let tx = self.db.transaction()?;
        if !TokenStore::new(&tx).mark_used(token.id, now)? {
            drop(tx);
            return Err(self.losing_scan_error(code, &holder)?);
        }

        let meal = Meal::from_token(&token, now);
        invariants::assert_meal_invariants(&meal);
        MealStore::new(&tx).create(&meal)?;
        tx.commit().map_err(Error::from)?;

        info!(
            token_id = %token.id,
            meal_id = %meal.id,
            meal_type = %token.meal_type,
            "Redeemed meal token"
        );

        Ok(RedeemReceipt {
            student: StudentSummary::from(&holder),
            meal_type: token.meal_type,
            specials: token.specials,
            amount: token.amount,
        })
    }

    /// Map a lost compare-and-swap to the state the winner left behind
    fn losing_scan_error(&self, code: &str, holder: &User) -> Result<RedeemError, Error> {
        warn!("Concurrent redemption detected");
        match self.db.meal_tokens().find_by_code(code)? {
            Some(t) if t.status == TokenStatus::Used => Ok(RedeemError::AlreadyUsed {
                student: StudentSummary::from(holder),
                meal_type: t.meal_type,
                used_at: t.used_at,
            }),
            Some(t) if t.status == TokenStatus::Expired => Ok(RedeemError::Expired {
                expires_at: t.expires_at,
            }),
            _ => Ok(RedeemError::Conflict),
        }
    }

    /// Non-mutating lookup of a scanned code
    pub fn lookup(&self, code: &str) -> crate::error::Result<TokenLookup> {
        let token = self
            .db
            .meal_tokens()
            .find_by_code(code)?
            .ok_or_else(|| Error::NotFound(format!("token '{}'", code)))?;

        let holder = self
            .db
            .users()
            .find_by_id(token.user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", token.user_id)))?;

        Ok(TokenLookup {
            student: StudentSummary::from(&holder),
            token,
        })
    }

    /// A student's outstanding active tokens
    pub fn active_tokens(&self, user_id: Uuid) -> crate::error::Result<Vec<MealToken>> {
        self.db.meal_tokens().list_active_for_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Organization, RateTable};
    use crate::storage::Database;

    fn test_org(db: &Database) -> Organization {
        let org = Organization::new(
            "North Mess".to_string(),
            "north@campus.test".to_string(),
            "hash".to_string(),
        )
        .with_rates(RateTable {
            breakfast_rate: 50,
            lunch_rate: 100,
            dinner_rate: 100,
            special_item_rate: 30,
            semester_hostel_fee: 500,
            basic_monthly_charge: 2000,
        });
        db.organizations().create(&org).unwrap();
        org
    }

    fn test_student(db: &Database, org_id: Uuid) -> User {
        let user = User::new(
            "Asha".to_string(),
            format!("asha-{}@campus.test", Uuid::new_v4()),
            "hash".to_string(),
        )
        .with_student_no(Uuid::new_v4().to_string())
        .with_organization(org_id);
        db.users().create(&user).unwrap();
        user
    }

    #[test]
    fn test_issue_prices_from_rate_table() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);

        let token = TokenService::new(&db)
            .issue(student.id, MealType::Lunch, 2, false)
            .unwrap();

        assert_eq!(token.rate, 100);
        assert_eq!(token.special_rate, 60);
        assert_eq!(token.amount, 160);
        assert_eq!(token.status, TokenStatus::Active);
        assert_eq!(token.payment_status, TokenPaymentStatus::Pending);
    }

    #[test]
    fn test_issue_pay_now() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);

        let token = TokenService::new(&db)
            .issue(student.id, MealType::Breakfast, 0, true)
            .unwrap();

        assert_eq!(token.amount, 50);
        assert_eq!(token.payment_status, TokenPaymentStatus::Paid);
    }

    #[test]
    fn test_issue_inactive_card_creates_nothing() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);
        db.users().set_card_active(student.id, false).unwrap();

        let result = TokenService::new(&db).issue(student.id, MealType::Dinner, 0, false);
        assert!(matches!(result, Err(IssueError::CardInactive)));
        assert!(db
            .meal_tokens()
            .list_active_for_user(student.id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_issue_rejects_out_of_range_specials() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);

        let result = TokenService::new(&db).issue(student.id, MealType::Lunch, 11, false);
        assert!(matches!(
            result,
            Err(IssueError::InvalidSpecials { given: 11 })
        ));
    }

    #[test]
    fn test_validate_records_meal_and_uses_token() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);
        let service = TokenService::new(&db);

        let token = service.issue(student.id, MealType::Lunch, 2, false).unwrap();
        let receipt = service.validate(&token.code).unwrap();

        assert_eq!(receipt.amount, 160);
        assert_eq!(receipt.meal_type, MealType::Lunch);
        assert_eq!(receipt.student.id, student.id);

        let stored = db.meal_tokens().find_by_code(&token.code).unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Used);
        assert!(stored.used_at.is_some());

        let meals = db.meals().list_for_user(student.id).unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].total_amount, 160);
        assert_eq!(meals[0].rate, 100);
        assert_eq!(meals[0].special_rate, 60);
        assert_eq!(meals[0].token_id, Some(token.id));
    }

    #[test]
    fn test_validate_twice_reports_already_used() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);
        let service = TokenService::new(&db);

        let token = service.issue(student.id, MealType::Dinner, 0, false).unwrap();
        service.validate(&token.code).unwrap();

        match service.validate(&token.code) {
            Err(RedeemError::AlreadyUsed {
                student: s,
                meal_type,
                used_at,
            }) => {
                assert_eq!(s.id, student.id);
                assert_eq!(meal_type, MealType::Dinner);
                assert!(used_at.is_some());
            }
            other => panic!("expected AlreadyUsed, got {:?}", other),
        }

        // Exactly one meal was recorded
        assert_eq!(db.meals().list_for_user(student.id).unwrap().len(), 1);
    }

    #[test]
    fn test_validate_unknown_code() {
        let db = Database::open_in_memory().unwrap();
        test_org(&db);

        let result = TokenService::new(&db).validate("no-such-code");
        assert!(matches!(result, Err(RedeemError::NotFound)));
    }

    #[test]
    fn test_validate_expired_token_persists_expired() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);
        let service = TokenService::new(&db);

        let mut token = MealToken::new(
            student.id,
            org.id,
            MealType::Lunch,
            0,
            100,
            0,
            TokenPaymentStatus::Pending,
        );
        token.generated_at = Utc::now() - chrono::Duration::hours(30);
        token.expires_at = Utc::now() - chrono::Duration::hours(6);
        db.meal_tokens().create(&token).unwrap();

        let result = service.validate(&token.code);
        assert!(matches!(result, Err(RedeemError::Expired { .. })));

        let stored = db.meal_tokens().find_by_code(&token.code).unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Expired);

        // Terminal: a later scan still reports expired, with no meal recorded
        assert!(matches!(
            service.validate(&token.code),
            Err(RedeemError::Expired { .. })
        ));
        assert!(db.meals().list_for_user(student.id).unwrap().is_empty());
    }

    #[test]
    fn test_validate_inactive_card_leaves_token_active() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);
        let service = TokenService::new(&db);

        let token = service.issue(student.id, MealType::Lunch, 0, false).unwrap();
        db.users().set_card_active(student.id, false).unwrap();

        assert!(matches!(
            service.validate(&token.code),
            Err(RedeemError::CardInactive)
        ));
        let stored = db.meal_tokens().find_by_code(&token.code).unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Active);

        // Retry succeeds after the card is switched back on
        db.users().set_card_active(student.id, true).unwrap();
        service.validate(&token.code).unwrap();
    }

    #[test]
    fn test_mark_used_cas_single_winner() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);

        let token = TokenService::new(&db)
            .issue(student.id, MealType::Lunch, 0, false)
            .unwrap();

        let now = Utc::now();
        assert!(db.meal_tokens().mark_used(token.id, now).unwrap());
        assert!(!db.meal_tokens().mark_used(token.id, now).unwrap());
    }

    #[test]
    fn test_expire_overdue_sweep() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);

        let mut stale = MealToken::new(
            student.id,
            org.id,
            MealType::Breakfast,
            0,
            50,
            0,
            TokenPaymentStatus::Pending,
        );
        stale.expires_at = Utc::now() - chrono::Duration::hours(1);
        db.meal_tokens().create(&stale).unwrap();

        let fresh = TokenService::new(&db)
            .issue(student.id, MealType::Lunch, 0, false)
            .unwrap();

        assert_eq!(db.meal_tokens().expire_overdue(Utc::now()).unwrap(), 1);
        assert_eq!(
            db.meal_tokens()
                .find_by_code(&stale.code)
                .unwrap()
                .unwrap()
                .status,
            TokenStatus::Expired
        );
        assert_eq!(
            db.meal_tokens()
                .find_by_code(&fresh.code)
                .unwrap()
                .unwrap()
                .status,
            TokenStatus::Active
        );
    }

    #[test]
    fn test_lookup_and_active_tokens() {
        let db = Database::open_in_memory().unwrap();
        let org = test_org(&db);
        let student = test_student(&db, org.id);
        let service = TokenService::new(&db);

        let token = service.issue(student.id, MealType::Dinner, 1, false).unwrap();

        let lookup = service.lookup(&token.code).unwrap();
        assert_eq!(lookup.token.id, token.id);
        assert_eq!(lookup.student.name, "Asha");

        let active = service.active_tokens(student.id).unwrap();
        assert_eq!(active.len(), 1);

        service.validate(&token.code).unwrap();
        assert!(service.active_tokens(student.id).unwrap().is_empty());
    }
}
