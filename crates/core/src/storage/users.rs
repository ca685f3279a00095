//! User storage operations

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_enum, parse_uuid, parse_uuid_opt, OptionalExt};
use crate::error::Result;
use crate::models::{Session, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, student_no, organization_id, \
     category, is_verified, is_card_active, is_pwd_verified, verification_documents, phone, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: parse_enum(&row.get::<_, String>(4)?)?,
        student_no: row.get(5)?,
        organization_id: parse_uuid_opt(row.get::<_, Option<String>>(6)?)?,
        category: parse_enum(&row.get::<_, String>(7)?)?,
        is_verified: row.get::<_, i32>(8)? != 0,
        is_card_active: row.get::<_, i32>(9)? != 0,
        is_pwd_verified: row.get::<_, i32>(10)? != 0,
        verification_documents: row.get(11)?,
        phone: row.get(12)?,
        created_at: parse_datetime(&row.get::<_, String>(13)?)?,
    })
}

pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new user
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn create(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, student_no, organization_id, \
             category, is_verified, is_card_active, is_pwd_verified, verification_documents, phone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.student_no,
                user.organization_id.map(|id| id.to_string()),
                user.category.as_str(),
                user.is_verified as i32,
                user.is_card_active as i32,
                user.is_pwd_verified as i32,
                user.verification_documents,
                user.phone,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;

        let user = stmt
            .query_row(params![id.to_string()], map_user)
            .optional()?;

        Ok(user)
    }

    /// Find user by email
    #[instrument(skip(self))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            USER_COLUMNS
        ))?;

        let user = stmt.query_row(params![email], map_user).optional()?;

        Ok(user)
    }

    /// Find user by campus student number (operator card lookup)
    #[instrument(skip(self))]
    pub fn find_by_student_no(&self, student_no: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE student_no = ?1",
            USER_COLUMNS
        ))?;

        let user = stmt.query_row(params![student_no], map_user).optional()?;

        Ok(user)
    }

    /// List all users
    pub fn list(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map([], map_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// List users belonging to one organization
    pub fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE organization_id = ?1 ORDER BY created_at",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map(params![organization_id.to_string()], map_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Update a user's mutable fields
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn update(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET name = ?1, email = ?2, role = ?3, student_no = ?4, \
             organization_id = ?5, category = ?6, is_verified = ?7, is_card_active = ?8, \
             is_pwd_verified = ?9, verification_documents = ?10, phone = ?11 WHERE id = ?12",
            params![
                user.name,
                user.email,
                user.role.as_str(),
                user.student_no,
                user.organization_id.map(|id| id.to_string()),
                user.category.as_str(),
                user.is_verified as i32,
                user.is_card_active as i32,
                user.is_pwd_verified as i32,
                user.verification_documents,
                user.phone,
                user.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Toggle the mess card
    pub fn set_card_active(&self, user_id: Uuid, active: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET is_card_active = ?1 WHERE id = ?2",
            params![active as i32, user_id.to_string()],
        )?;
        Ok(())
    }

    /// Create a session
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find valid session
    #[instrument(skip(self))]
    pub fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1 AND expires_at > ?2",
        )?;

        let now = Utc::now().to_rfc3339();
        let session = stmt
            .query_row(params![session_id.to_string(), now], |row| {
                Ok(Session {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Delete session
    pub fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(())
    }

    /// Delete all sessions for user
    pub fn delete_user_sessions(&self, user_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(())
    }

    /// Clean up expired sessions
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}
