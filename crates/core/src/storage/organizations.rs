//! Organization storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Organization, RateTable};

const ORG_COLUMNS: &str = "id, name, email, password_hash, address, breakfast_rate, lunch_rate, \
     dinner_rate, special_item_rate, semester_hostel_fee, basic_monthly_charge, created_at";

fn map_organization(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        address: row.get(4)?,
        rates: RateTable {
            breakfast_rate: row.get(5)?,
            lunch_rate: row.get(6)?,
            dinner_rate: row.get(7)?,
            special_item_rate: row.get(8)?,
            semester_hostel_fee: row.get(9)?,
            basic_monthly_charge: row.get(10)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(11)?)?,
    })
}

pub struct OrganizationStore<'a> {
    conn: &'a Connection,
}

impl<'a> OrganizationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new organization
    #[instrument(skip(self, org), fields(name = %org.name))]
    pub fn create(&self, org: &Organization) -> Result<()> {
        self.conn.execute(
            "INSERT INTO organizations (id, name, email, password_hash, address, breakfast_rate, \
             lunch_rate, dinner_rate, special_item_rate, semester_hostel_fee, basic_monthly_charge, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                org.id.to_string(),
                org.name,
                org.email,
                org.password_hash,
                org.address,
                org.rates.breakfast_rate,
                org.rates.lunch_rate,
                org.rates.dinner_rate,
                org.rates.special_item_rate,
                org.rates.semester_hostel_fee,
                org.rates.basic_monthly_charge,
                org.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find organization by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM organizations WHERE id = ?1",
            ORG_COLUMNS
        ))?;

        let org = stmt
            .query_row(params![id.to_string()], map_organization)
            .optional()?;

        Ok(org)
    }

    /// Find organization by email
    pub fn find_by_email(&self, email: &str) -> Result<Option<Organization>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM organizations WHERE email = ?1",
            ORG_COLUMNS
        ))?;

        let org = stmt
            .query_row(params![email], map_organization)
            .optional()?;

        Ok(org)
    }

    /// List all organizations
    pub fn list(&self) -> Result<Vec<Organization>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM organizations ORDER BY created_at",
            ORG_COLUMNS
        ))?;

        let orgs = stmt
            .query_map([], map_organization)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(orgs)
    }

    /// Replace an organization's rate table
    #[instrument(skip(self, rates))]
    pub fn update_rates(&self, organization_id: Uuid, rates: &RateTable) -> Result<()> {
        self.conn.execute(
            "UPDATE organizations SET breakfast_rate = ?1, lunch_rate = ?2, dinner_rate = ?3, \
             special_item_rate = ?4, semester_hostel_fee = ?5, basic_monthly_charge = ?6 WHERE id = ?7",
            params![
                rates.breakfast_rate,
                rates.lunch_rate,
                rates.dinner_rate,
                rates.special_item_rate,
                rates.semester_hostel_fee,
                rates.basic_monthly_charge,
                organization_id.to_string(),
            ],
        )?;
        Ok(())
    }
}
