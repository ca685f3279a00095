//! Tiffin Core Library
//!
//! Domain models, token lifecycle, billing logic, and storage for the
//! Tiffin campus mess platform.

pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod invariants;
pub mod meals;
pub mod models;
pub mod orgs;
pub mod payments;
pub mod permissions;
pub mod storage;
pub mod tokens;
pub mod users;

pub use auth::{AuthService, Registration};
pub use billing::{tally_month, BillTotals, BillingPeriod, BillingService};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use meals::MealService;
pub use models::*;
pub use orgs::OrganizationService;
pub use payments::PaymentService;
pub use permissions::*;
pub use storage::{
    BillRepository, Database, MealRepository, OrganizationRepository, Storage, TokenRepository,
    UserRepository,
};
pub use tokens::{
    IssueError, RedeemError, RedeemReceipt, StudentSummary, TokenLookup, TokenService,
};
pub use users::{ProfileUpdate, UserService};
