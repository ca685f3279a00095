//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future network backend).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Bill, Meal, MealToken, Organization, RateTable, Session, User};

/// User repository operations
pub trait UserRepository {
    /// Create a new user
    fn create_user(&self, user: &User) -> Result<()>;

    /// Find user by ID
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find user by email
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find user by campus student number
    fn find_user_by_student_no(&self, student_no: &str) -> Result<Option<User>>;

    /// List all users
    fn list_users(&self) -> Result<Vec<User>>;

    /// Update a user's mutable fields
    fn update_user(&self, user: &User) -> Result<()>;

    /// Toggle the mess card
    fn set_card_active(&self, user_id: Uuid, active: bool) -> Result<()>;

    /// Create a session
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Find a valid (non-expired) session
    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Delete a session
    fn delete_session(&self, session_id: Uuid) -> Result<()>;

    /// Delete all sessions for a user
    fn delete_user_sessions(&self, user_id: Uuid) -> Result<()>;

    /// Clean up expired sessions
    fn cleanup_expired_sessions(&self) -> Result<u64>;
}

/// Organization repository operations
pub trait OrganizationRepository {
    /// Create a new organization
    fn create_organization(&self, org: &Organization) -> Result<()>;

    /// Find organization by ID
    fn find_organization_by_id(&self, id: Uuid) -> Result<Option<Organization>>;

    /// Find organization by email
    fn find_organization_by_email(&self, email: &str) -> Result<Option<Organization>>;

    /// List all organizations
    fn list_organizations(&self) -> Result<Vec<Organization>>;

    /// Replace an organization's rate table
    fn update_organization_rates(&self, organization_id: Uuid, rates: &RateTable) -> Result<()>;
}

/// Meal token repository operations
pub trait TokenRepository {
    /// Create a new token
    fn create_token(&self, token: &MealToken) -> Result<()>;

    /// Find token by its opaque code
    fn find_token_by_code(&self, code: &str) -> Result<Option<MealToken>>;

    /// List a user's outstanding active tokens
    fn list_active_tokens(&self, user_id: Uuid) -> Result<Vec<MealToken>>;

    /// Atomically transition active -> used; false if the token lost the race
    fn mark_token_used(&self, token_id: Uuid, used_at: DateTime<Utc>) -> Result<bool>;

    /// Atomically transition active -> expired
    fn mark_token_expired(&self, token_id: Uuid) -> Result<bool>;

    /// Materialize expiry for all overdue active tokens
    fn expire_overdue_tokens(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Meal record repository operations
pub trait MealRepository {
    /// Create a meal record
    fn create_meal(&self, meal: &Meal) -> Result<()>;

    /// Full meal history for a user, newest first
    fn list_meals_for_user(&self, user_id: Uuid) -> Result<Vec<Meal>>;

    /// A user's meals in [start, end), oldest first
    fn list_meals_for_user_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meal>>;

    /// All meals served in [start, end), newest first
    fn list_meals_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Meal>>;
}

/// Bill repository operations
pub trait BillRepository {
    /// Create a new bill
    fn create_bill(&self, bill: &Bill) -> Result<()>;

    /// Rewrite a bill's snapshot, derived totals, and payment state
    fn update_bill(&self, bill: &Bill) -> Result<()>;

    /// Find bill by ID
    fn find_bill_by_id(&self, id: Uuid) -> Result<Option<Bill>>;

    /// Find the unique bill for (user, month, year)
    fn find_bill_for_period(&self, user_id: Uuid, month: u32, year: i32)
        -> Result<Option<Bill>>;

    /// List a user's bills, newest first
    fn list_bills_for_user(&self, user_id: Uuid) -> Result<Vec<Bill>>;

    /// List all bills, optionally restricted to one period
    fn list_all_bills(&self, period: Option<(u32, i32)>) -> Result<Vec<Bill>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage:
    UserRepository + OrganizationRepository + TokenRepository + MealRepository + BillRepository
{
}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where
    T: UserRepository + OrganizationRepository + TokenRepository + MealRepository + BillRepository
{
}
