//! User and session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Mess member who acquires and spends meal tokens
    Student,
    /// Mess staff who scan and redeem tokens
    Admin,
    /// Organization account managing the rate table
    Organization,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
            Role::Organization => "organization",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            "organization" => Ok(Role::Organization),
            other => Err(Error::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Administrative classification deciding semester-fee exemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    General,
    #[serde(rename = "OBC")]
    Obc,
    #[serde(rename = "SC")]
    Sc,
    #[serde(rename = "ST")]
    St,
    #[serde(rename = "PwD")]
    Pwd,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Obc => "OBC",
            Category::Sc => "SC",
            Category::St => "ST",
            Category::Pwd => "PwD",
        }
    }

    /// Whether this category is exempt from the semester hostel fee
    pub fn is_fee_exempt(&self) -> bool {
        matches!(self, Category::Sc | Category::St | Category::Pwd)
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "General" => Ok(Category::General),
            "OBC" => Ok(Category::Obc),
            "SC" => Ok(Category::Sc),
            "ST" => Ok(Category::St),
            "PwD" => Ok(Category::Pwd),
            other => Err(Error::InvalidInput(format!("unknown category '{}'", other))),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered account (student, mess staff, or organization admin)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Campus-issued student number, printed on the mess card
    pub student_no: Option<String>,
    pub organization_id: Option<Uuid>,
    pub category: Category,
    pub is_verified: bool,
    /// Token issuance and redemption are gated on this flag
    pub is_card_active: bool,
    pub is_pwd_verified: bool,
    pub verification_documents: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role: Role::Student,
            student_no: None,
            organization_id: None,
            category: Category::General,
            is_verified: false,
            is_card_active: true,
            is_pwd_verified: false,
            verification_documents: None,
            phone: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_student_no(mut self, student_no: String) -> Self {
        self.student_no = Some(student_no);
        self
    }

    pub fn with_organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }
}

/// Active session for a logged-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, duration_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: now,
            expires_at: now + chrono::Duration::hours(duration_hours),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}
