//! SQLite storage layer for Tiffin

mod bills;
mod meals;
mod migrations;
mod organizations;
mod parse;
mod tokens;
mod traits;
mod users;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Bill, Meal, MealToken, Organization, RateTable, Session, User};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

pub use bills::BillStore;
pub use meals::MealStore;
pub use organizations::OrganizationStore;
pub use tokens::TokenStore;
pub use traits::{
    BillRepository, MealRepository, OrganizationRepository, Storage, TokenRepository,
    UserRepository,
};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Begin a transaction for multi-write operations
    ///
    /// The token redeem flow runs the status flip and the meal insert
    /// under one transaction so they are a single durable operation.
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Get user store
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    /// Get organization store
    pub fn organizations(&self) -> OrganizationStore<'_> {
        OrganizationStore::new(&self.conn)
    }

    /// Get meal token store
    pub fn meal_tokens(&self) -> TokenStore<'_> {
        TokenStore::new(&self.conn)
    }

    /// Get meal record store
    pub fn meals(&self) -> MealStore<'_> {
        MealStore::new(&self.conn)
    }

    /// Get bill store
    pub fn bills(&self) -> BillStore<'_> {
        BillStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl UserRepository for Database {
    fn create_user(&self, user: &User) -> Result<()> {
        self.users().create(user)
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users().find_by_email(email)
    }

    fn find_user_by_student_no(&self, student_no: &str) -> Result<Option<User>> {
        self.users().find_by_student_no(student_no)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.users().list()
    }

    fn update_user(&self, user: &User) -> Result<()> {
        self.users().update(user)
    }

    fn set_card_active(&self, user_id: Uuid, active: bool) -> Result<()> {
        self.users().set_card_active(user_id, active)
    }

    fn create_session(&self, session: &Session) -> Result<()> {
        self.users().create_session(session)
    }

    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.users().find_valid_session(session_id)
    }

    fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.users().delete_session(session_id)
    }

    fn delete_user_sessions(&self, user_id: Uuid) -> Result<()> {
        self.users().delete_user_sessions(user_id)
    }

    fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.users().cleanup_expired_sessions()
    }
}

impl OrganizationRepository for Database {
    fn create_organization(&self, org: &Organization) -> Result<()> {
        self.organizations().create(org)
    }

    fn find_organization_by_id(&self, id: Uuid) -> Result<Option<Organization>> {
        self.organizations().find_by_id(id)
    }

    fn find_organization_by_email(&self, email: &str) -> Result<Option<Organization>> {
        self.organizations().find_by_email(email)
    }

    fn list_organizations(&self) -> Result<Vec<Organization>> {
        self.organizations().list()
    }

    fn update_organization_rates(&self, organization_id: Uuid, rates: &RateTable) -> Result<()> {
        self.organizations().update_rates(organization_id, rates)
    }
}

impl TokenRepository for Database {
    fn create_token(&self, token: &MealToken) -> Result<()> {
        self.meal_tokens().create(token)
    }

    fn find_token_by_code(&self, code: &str) -> Result<Option<MealToken>> {
        self.meal_tokens().find_by_code(code)
    }

    fn list_active_tokens(&self, user_id: Uuid) -> Result<Vec<MealToken>> {
        self.meal_tokens().list_active_for_user(user_id)
    }

    fn mark_token_used(&self, token_id: Uuid, used_at: DateTime<Utc>) -> Result<bool> {
        self.meal_tokens().mark_used(token_id, used_at)
    }

    fn mark_token_expired(&self, token_id: Uuid) -> Result<bool> {
        self.meal_tokens().mark_expired(token_id)
    }

    fn expire_overdue_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        self.meal_tokens().expire_overdue(now)
    }
}

impl MealRepository for Database {
    fn create_meal(&self, meal: &Meal) -> Result<()> {
        self.meals().create(meal)
    }

    fn list_meals_for_user(&self, user_id: Uuid) -> Result<Vec<Meal>> {
        self.meals().list_for_user(user_id)
    }

    fn list_meals_for_user_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meal>> {
        self.meals().list_for_user_between(user_id, start, end)
    }

    fn list_meals_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Meal>> {
        self.meals().list_between(start, end)
    }
}

impl BillRepository for Database {
    fn create_bill(&self, bill: &Bill) -> Result<()> {
        self.bills().create(bill)
    }

    fn update_bill(&self, bill: &Bill) -> Result<()> {
        self.bills().update(bill)
    }

    fn find_bill_by_id(&self, id: Uuid) -> Result<Option<Bill>> {
        self.bills().find_by_id(id)
    }

    fn find_bill_for_period(
        &self,
        user_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Option<Bill>> {
        self.bills().find_for_period(user_id, month, year)
    }

    fn list_bills_for_user(&self, user_id: Uuid) -> Result<Vec<Bill>> {
        self.bills().list_for_user(user_id)
    }

    fn list_all_bills(&self, period: Option<(u32, i32)>) -> Result<Vec<Bill>> {
        self.bills().list_all(period)
    }
}
