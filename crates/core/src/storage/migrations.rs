//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Organizations table (tenant mess with its rate table)
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                address TEXT,
                breakfast_rate INTEGER NOT NULL DEFAULT 50,
                lunch_rate INTEGER NOT NULL DEFAULT 100,
                dinner_rate INTEGER NOT NULL DEFAULT 100,
                special_item_rate INTEGER NOT NULL DEFAULT 30,
                semester_hostel_fee INTEGER NOT NULL DEFAULT 500,
                basic_monthly_charge INTEGER NOT NULL DEFAULT 2000,
                created_at TEXT NOT NULL
            );

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'student',
                student_no TEXT UNIQUE,
                organization_id TEXT,
                category TEXT NOT NULL DEFAULT 'General',
                is_verified INTEGER NOT NULL DEFAULT 0,
                is_card_active INTEGER NOT NULL DEFAULT 1,
                is_pwd_verified INTEGER NOT NULL DEFAULT 0,
                phone TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id)
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Meal tokens table (single-use claim checks)
            CREATE TABLE IF NOT EXISTS meal_tokens (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                specials INTEGER NOT NULL DEFAULT 0,
                rate INTEGER NOT NULL,
                special_rate INTEGER NOT NULL DEFAULT 0,
                amount INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                payment_status TEXT NOT NULL DEFAULT 'pending',
                generated_at TEXT NOT NULL,
                used_at TEXT,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (organization_id) REFERENCES organizations(id)
            );

            -- Meals table (permanent billing units)
            CREATE TABLE IF NOT EXISTS meals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                specials INTEGER NOT NULL DEFAULT 0,
                token_id TEXT,
                rate INTEGER NOT NULL,
                special_rate INTEGER NOT NULL DEFAULT 0,
                total_amount INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (organization_id) REFERENCES organizations(id),
                FOREIGN KEY (token_id) REFERENCES meal_tokens(id)
            );

            -- Bills table (one per user, month, year)
            CREATE TABLE IF NOT EXISTS bills (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                month INTEGER NOT NULL,
                year INTEGER NOT NULL,
                meals_json TEXT NOT NULL DEFAULT '[]',
                breakfast_count INTEGER NOT NULL DEFAULT 0,
                lunch_count INTEGER NOT NULL DEFAULT 0,
                dinner_count INTEGER NOT NULL DEFAULT 0,
                special_count INTEGER NOT NULL DEFAULT 0,
                subtotal INTEGER NOT NULL DEFAULT 0,
                semester_hostel_fee INTEGER NOT NULL DEFAULT 0,
                total INTEGER NOT NULL DEFAULT 0,
                category TEXT NOT NULL DEFAULT 'General',
                is_semester_fee_applied INTEGER NOT NULL DEFAULT 0,
                payment_status TEXT NOT NULL DEFAULT 'pending',
                payment_history_json TEXT NOT NULL DEFAULT '[]',
                due_amount INTEGER NOT NULL DEFAULT 0,
                generated_at TEXT NOT NULL,
                paid_at TEXT,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (organization_id) REFERENCES organizations(id),
                UNIQUE(user_id, month, year)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            -- User indexes
            CREATE INDEX IF NOT EXISTS idx_users_organization ON users(organization_id);

            -- Token indexes
            CREATE INDEX IF NOT EXISTS idx_meal_tokens_code ON meal_tokens(code);
            CREATE INDEX IF NOT EXISTS idx_meal_tokens_user_status ON meal_tokens(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_meal_tokens_expires ON meal_tokens(expires_at);

            -- Meal indexes
            CREATE INDEX IF NOT EXISTS idx_meals_user_timestamp ON meals(user_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_meals_timestamp ON meals(timestamp);

            -- Bill indexes
            CREATE INDEX IF NOT EXISTS idx_bills_user ON bills(user_id);
            CREATE INDEX IF NOT EXISTS idx_bills_period ON bills(month, year);
        "#,
    },
    Migration {
        version: 3,
        description: "Add verification document reference for category review",
        sql: r#"
            -- Uploaded document reference checked during PwD/category verification
            ALTER TABLE users ADD COLUMN verification_documents TEXT;
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
