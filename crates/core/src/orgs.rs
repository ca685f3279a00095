//! Organization enrollment and rate management

use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth;
use crate::error::{Error, Result};
use crate::invariants;
use crate::models::{Organization, RateTable, User};
use crate::permissions::{MessAction, PermissionMatrix};
use crate::storage::Database;

fn check_rates(rates: &RateTable) -> Result<()> {
    if rates.breakfast_rate < 0
        || rates.lunch_rate < 0
        || rates.dinner_rate < 0
        || rates.special_item_rate < 0
        || rates.semester_hostel_fee < 0
        || rates.basic_monthly_charge < 0
    {
        return Err(Error::InvalidInput(
            "rates must be non-negative".to_string(),
        ));
    }
    Ok(())
}

/// Enrolls organizations and manages their rate tables
pub struct OrganizationService<'a> {
    db: &'a Database,
}

impl<'a> OrganizationService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Enroll a new mess organization
    #[instrument(skip(self, password, rates))]
    pub fn enroll(
        &self,
        name: &str,
        email: &str,
        password: &str,
        rates: RateTable,
    ) -> Result<Organization> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("name must not be empty".to_string()));
        }
        check_rates(&rates)?;
        if self.db.organizations().find_by_email(email)?.is_some() {
            return Err(Error::InvalidInput("email already registered".to_string()));
        }

        let password_hash = auth::hash_password(password)?;
        let org = Organization::new(name.to_string(), email.to_string(), password_hash)
            .with_rates(rates);
        invariants::assert_rate_table_invariants(&org.rates);

        self.db.organizations().create(&org)?;

        info!(org_id = %org.id, name = %org.name, "Enrolled organization");

        Ok(org)
    }

    /// Fetch an organization
    pub fn get(&self, organization_id: Uuid) -> Result<Organization> {
        self.db
            .organizations()
            .find_by_id(organization_id)?
            .ok_or_else(|| Error::NotFound(format!("organization {}", organization_id)))
    }

    /// List all organizations
    pub fn list(&self) -> Result<Vec<Organization>> {
        self.db.organizations().list()
    }

    /// Replace the rate table of the actor's own organization
    ///
    /// Issued tokens keep their captured prices; only future issuance
    /// and billing see the new table.
    #[instrument(skip(self, actor, rates), fields(actor_id = %actor.id))]
    pub fn update_rates(&self, actor: &User, rates: RateTable) -> Result<Organization> {
        if !PermissionMatrix::can_perform(actor.role, MessAction::UpdateRates) {
            return Err(Error::PermissionDenied(
                "rate updates require an organization account".to_string(),
            ));
        }
        let org_id = actor
            .organization_id
            .ok_or_else(|| Error::NotFound(format!("organization for user {}", actor.id)))?;
        check_rates(&rates)?;

        self.db.organizations().update_rates(org_id, &rates)?;
        info!(%org_id, "Updated rate table");
        self.get(org_id)
    }
}
