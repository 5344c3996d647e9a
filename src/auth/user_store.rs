//! User Storage
//! Mission: Securely store and manage caregiver accounts with SQLite

use crate::auth::models::User;
use crate::config::MIN_BCRYPT_COST;
use crate::db::{timestamp_col, timestamp_to_sql, uuid_col, Database};
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{ffi, params, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// User storage with SQLite backend
pub struct UserStore {
    db: Database,
    hash_cost: u32,
}

impl UserStore {
    /// Create a user store over an opened database. Costs below 10 are raised to 10.
    pub fn new(db: Database, hash_cost: u32) -> Self {
        Self {
            db,
            hash_cost: hash_cost.max(MIN_BCRYPT_COST),
        }
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: uuid_col(row, 0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: timestamp_col(row, 4)?,
            updated_at: timestamp_col(row, 5)?,
        })
    }

    /// Get user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.db.lock();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;

        stmt.query_row(params![email], Self::user_from_row)
            .optional()
            .context("Failed to look up user by email")
    }

    /// Get user by id
    pub fn get_user_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.db.lock();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;

        stmt.query_row(params![user_id.to_string()], Self::user_from_row)
            .optional()
            .context("Failed to look up user by id")
    }

    pub fn user_exists(&self, user_id: &Uuid) -> Result<bool> {
        Ok(self.get_user_by_id(user_id)?.is_some())
    }

    /// Compare a plaintext password against the user's stored hash
    pub fn verify_password(user: &User, password: &str) -> Result<bool> {
        verify(password, &user.password_hash).context("Failed to verify password")
    }

    /// Create a new user. Returns `None` when the email is already registered.
    pub fn create_user(&self, name: &str, email: &str, password: &str) -> Result<Option<User>> {
        if self.get_user_by_email(email)?.is_some() {
            return Ok(None);
        }

        let password_hash = hash(password, self.hash_cost).context("Failed to hash password")?;
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        };

        let conn = self.db.lock();
        let inserted = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                timestamp_to_sql(&user.created_at),
                timestamp_to_sql(&user.updated_at),
            ],
        );

        match inserted {
            Ok(_) => {}
            // Lost a race with a concurrent signup for the same email
            Err(e) if is_duplicate_email(&e) => return Ok(None),
            Err(e) => return Err(e).context("Failed to insert user"),
        }

        info!("✅ Created user: {} ({})", user.email, user.id);

        Ok(Some(user))
    }
}

/// Only the UNIQUE index on `users.email`; other constraint failures are real errors
fn is_duplicate_email(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE && msg.contains("users.email")
        }
        _ => false,
    }
}
