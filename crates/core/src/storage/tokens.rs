//! Meal token storage operations
//!
//! The status transition out of `active` is a conditional update checked
//! on affected rows, so two racing redemptions resolve to one winner.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_datetime_opt, parse_enum, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::MealToken;

const TOKEN_COLUMNS: &str = "id, code, user_id, organization_id, meal_type, specials, rate, \
     special_rate, amount, status, payment_status, generated_at, used_at, expires_at";

fn map_token(row: &Row<'_>) -> rusqlite::Result<MealToken> {
    Ok(MealToken {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        code: row.get(1)?,
        user_id: parse_uuid(&row.get::<_, String>(2)?)?,
        organization_id: parse_uuid(&row.get::<_, String>(3)?)?,
        meal_type: parse_enum(&row.get::<_, String>(4)?)?,
        specials: row.get(5)?,
        rate: row.get(6)?,
        special_rate: row.get(7)?,
        amount: row.get(8)?,
        status: parse_enum(&row.get::<_, String>(9)?)?,
        payment_status: parse_enum(&row.get::<_, String>(10)?)?,
        generated_at: parse_datetime(&row.get::<_, String>(11)?)?,
        used_at: parse_datetime_opt(row.get::<_, Option<String>>(12)?)?,
        expires_at: parse_datetime(&row.get::<_, String>(13)?)?,
    })
}

pub struct TokenStore<'a> {
    conn: &'a Connection,
}

impl<'a> TokenStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new token
    #[instrument(skip(self, token), fields(user_id = %token.user_id))]
    pub fn create(&self, token: &MealToken) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meal_tokens (id, code, user_id, organization_id, meal_type, specials, \
             rate, special_rate, amount, status, payment_status, generated_at, used_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                token.id.to_string(),
                token.code,
                token.user_id.to_string(),
                token.organization_id.to_string(),
                token.meal_type.as_str(),
                token.specials,
                token.rate,
                token.special_rate,
                token.amount,
                token.status.as_str(),
                token.payment_status.as_str(),
                token.generated_at.to_rfc3339(),
                token.used_at.map(|t| t.to_rfc3339()),
                token.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find token by its opaque code
    #[instrument(skip(self, code))]
    pub fn find_by_code(&self, code: &str) -> Result<Option<MealToken>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meal_tokens WHERE code = ?1",
            TOKEN_COLUMNS
        ))?;

        let token = stmt.query_row(params![code], map_token).optional()?;

        Ok(token)
    }

    /// Find token by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<MealToken>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meal_tokens WHERE id = ?1",
            TOKEN_COLUMNS
        ))?;

        let token = stmt
            .query_row(params![id.to_string()], map_token)
            .optional()?;

        Ok(token)
    }

    /// List a user's outstanding active tokens
    pub fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<MealToken>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meal_tokens WHERE user_id = ?1 AND status = 'active' \
             ORDER BY generated_at DESC",
            TOKEN_COLUMNS
        ))?;

        let tokens = stmt
            .query_map(params![user_id.to_string()], map_token)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tokens)
    }

    /// Atomically transition active -> used
    ///
    /// Returns false when the token was not active anymore, i.e. a
    /// concurrent redemption or expiry won.
    #[instrument(skip(self))]
    pub fn mark_used(&self, token_id: Uuid, used_at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE meal_tokens SET status = 'used', used_at = ?1 \
             WHERE id = ?2 AND status = 'active'",
            params![used_at.to_rfc3339(), token_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    /// Atomically transition active -> expired
    #[instrument(skip(self))]
    pub fn mark_expired(&self, token_id: Uuid) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE meal_tokens SET status = 'expired' WHERE id = ?1 AND status = 'active'",
            params![token_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    /// Materialize expiry for every active token past its deadline
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let count = self.conn.execute(
            "UPDATE meal_tokens SET status = 'expired' \
             WHERE status = 'active' AND expires_at < ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}
