//! Meal record storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_enum, parse_uuid, parse_uuid_opt, OptionalExt};
use crate::error::Result;
use crate::models::Meal;

const MEAL_COLUMNS: &str = "id, user_id, organization_id, meal_type, specials, token_id, rate, \
     special_rate, total_amount, timestamp";

fn map_meal(row: &Row<'_>) -> rusqlite::Result<Meal> {
    Ok(Meal {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1)?)?,
        organization_id: parse_uuid(&row.get::<_, String>(2)?)?,
        meal_type: parse_enum(&row.get::<_, String>(3)?)?,
        specials: row.get(4)?,
        token_id: parse_uuid_opt(row.get::<_, Option<String>>(5)?)?,
        rate: row.get(6)?,
        special_rate: row.get(7)?,
        total_amount: row.get(8)?,
        timestamp: parse_datetime(&row.get::<_, String>(9)?)?,
    })
}

pub struct MealStore<'a> {
    conn: &'a Connection,
}

impl<'a> MealStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a meal record; meals are never updated or deleted
    #[instrument(skip(self, meal), fields(user_id = %meal.user_id))]
    pub fn create(&self, meal: &Meal) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meals (id, user_id, organization_id, meal_type, specials, token_id, \
             rate, special_rate, total_amount, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                meal.id.to_string(),
                meal.user_id.to_string(),
                meal.organization_id.to_string(),
                meal.meal_type.as_str(),
                meal.specials,
                meal.token_id.map(|id| id.to_string()),
                meal.rate,
                meal.special_rate,
                meal.total_amount,
                meal.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find meal by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Meal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meals WHERE id = ?1",
            MEAL_COLUMNS
        ))?;

        let meal = stmt
            .query_row(params![id.to_string()], map_meal)
            .optional()?;

        Ok(meal)
    }

    /// Full meal history for a user, newest first
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meals WHERE user_id = ?1 ORDER BY timestamp DESC",
            MEAL_COLUMNS
        ))?;

        let meals = stmt
            .query_map(params![user_id.to_string()], map_meal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(meals)
    }

    /// A user's meals in [start, end), oldest first (billing window scan)
    #[instrument(skip(self))]
    pub fn list_for_user_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meals WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp < ?3 \
             ORDER BY timestamp",
            MEAL_COLUMNS
        ))?;

        let meals = stmt
            .query_map(
                params![
                    user_id.to_string(),
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ],
                map_meal,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(meals)
    }

    /// All meals served in [start, end), newest first (operator day view)
    pub fn list_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meals WHERE timestamp >= ?1 AND timestamp < ?2 \
             ORDER BY timestamp DESC",
            MEAL_COLUMNS
        ))?;

        let meals = stmt
            .query_map(params![start.to_rfc3339(), end.to_rfc3339()], map_meal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(meals)
    }
}
