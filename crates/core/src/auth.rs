//! Authentication: registration, login, sessions

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Category, Role, Session, User};
use crate::storage::Database;

/// Session lifetime handed out at login
pub const SESSION_VALIDITY_HOURS: i64 = 24 * 7;

const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password into PHC string format
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| Error::Authentication("failed to hash password".to_string()))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|_| Error::Authentication("invalid stored password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Everything needed to open an account
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub student_no: Option<String>,
    pub organization_id: Option<Uuid>,
    pub category: Category,
}

impl Registration {
    /// A student registration with the common defaults
    pub fn student(name: String, email: String, password: String) -> Self {
        Self {
            name,
            email,
            password,
            role: Role::Student,
            student_no: None,
            organization_id: None,
            category: Category::General,
        }
    }
}

/// Registers accounts and manages their sessions
pub struct AuthService<'a> {
    db: &'a Database,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create an account and log it in
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub fn register(&self, registration: Registration) -> Result<(User, Session)> {
        if registration.name.trim().is_empty() {
            return Err(Error::InvalidInput("name must not be empty".to_string()));
        }
        if registration.password.len() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self
            .db
            .users()
            .find_by_email(&registration.email)?
            .is_some()
        {
            return Err(Error::InvalidInput("email already registered".to_string()));
        }

        let password_hash = hash_password(&registration.password)?;
        let mut user = User::new(registration.name, registration.email, password_hash)
            .with_role(registration.role)
            .with_category(registration.category);
        user.student_no = registration.student_no;
        user.organization_id = registration.organization_id;

        self.db.users().create(&user)?;

        let session = Session::new(user.id, SESSION_VALIDITY_HOURS);
        self.db.users().create_session(&session)?;

        info!(user_id = %user.id, role = %user.role, "Registered user");

        Ok((user, session))
    }

    /// Verify credentials and open a session
    #[instrument(skip(self, password))]
    pub fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let user = self
            .db
            .users()
            .find_by_email(email)?
            .ok_or_else(|| Error::Authentication("invalid credentials".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(Error::Authentication("invalid credentials".to_string()));
        }

        let session = Session::new(user.id, SESSION_VALIDITY_HOURS);
        self.db.users().create_session(&session)?;

        info!(user_id = %user.id, "Logged in");

        Ok((user, session))
    }

    /// Close a session
    pub fn logout(&self, session_id: Uuid) -> Result<()> {
        self.db.users().delete_session(session_id)
    }

    /// Resolve a session to its user, if still valid
    pub fn session_user(&self, session_id: Uuid) -> Result<Option<User>> {
        match self.db.users().find_valid_session(session_id)? {
            Some(session) => self.db.users().find_by_id(session.user_id),
            None => Ok(None),
        }
    }
}
