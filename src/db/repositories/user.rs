//! User repository
//!
//! Database operations for users and their profiles.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for account data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! A user and its profile are always written together, so an account is
//! never visible without a profile.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Account, AgeGroup, Profile, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user and its profile in one transaction.
    ///
    /// The first account ever stored becomes `admin` regardless of
    /// `user.role`.
    async fn create_account(&self, user: &User, profile: &Profile) -> Result<Account>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get a user together with their profile
    async fn get_account(&self, user_id: i64) -> Result<Option<Account>>;

    /// Overwrite a profile
    async fn update_profile(&self, profile: &Profile) -> Result<Profile>;

    /// Replace the password hash
    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()>;

    /// Change a user's role
    async fn set_role(&self, user_id: i64, role: UserRole) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// All accounts, newest first
    async fn list_accounts(&self) -> Result<Vec<Account>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create_account(&self, user: &User, profile: &Profile) -> Result<Account> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_account_sqlite(self.pool.sqlite()?, user, profile).await,
            DatabaseDriver::Mysql => create_account_mysql(self.pool.mysql()?, user, profile).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_email_sqlite(self.pool.sqlite()?, email).await,
            DatabaseDriver::Mysql => get_user_by_email_mysql(self.pool.mysql()?, email).await,
        }
    }

    async fn get_account(&self, user_id: i64) -> Result<Option<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_account_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => get_account_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn update_profile(&self, profile: &Profile) -> Result<Profile> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_profile_sqlite(self.pool.sqlite()?, profile).await,
            DatabaseDriver::Mysql => update_profile_mysql(self.pool.mysql()?, profile).await,
        }
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_password_sqlite(self.pool.sqlite()?, user_id, password_hash).await
            }
            DatabaseDriver::Mysql => {
                update_password_mysql(self.pool.mysql()?, user_id, password_hash).await
            }
        }
    }

    async fn set_role(&self, user_id: i64, role: UserRole) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_role_sqlite(self.pool.sqlite()?, user_id, role).await,
            DatabaseDriver::Mysql => set_role_mysql(self.pool.mysql()?, user_id, role).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_users_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => count_users_mysql(self.pool.mysql()?).await,
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_accounts_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_accounts_mysql(self.pool.mysql()?).await,
        }
    }
}

const INSERT_USER: &str = r#"
    INSERT INTO users (email, password_hash, role, created_at, updated_at)
    SELECT ?, ?, CASE WHEN EXISTS (SELECT 1 FROM users) THEN ? ELSE 'admin' END, ?, ?
"#;

const INSERT_PROFILE: &str = r#"
    INSERT INTO profiles (user_id, full_name, age, age_group, gender, guardian_name,
        guardian_contact, city, country, pincode, consent_given, consent_timestamp,
        created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_PROFILE: &str = r#"
    UPDATE profiles
    SET full_name = ?, age = ?, age_group = ?, gender = ?, guardian_name = ?,
        guardian_contact = ?, city = ?, country = ?, pincode = ?, updated_at = ?
    WHERE user_id = ?
"#;

const SELECT_USER: &str =
    "SELECT id, email, password_hash, role, created_at, updated_at FROM users";

const SELECT_ACCOUNT: &str = r#"
    SELECT u.id, u.email, u.password_hash, u.role, u.created_at, u.updated_at,
        p.full_name, p.age, p.age_group, p.gender, p.guardian_name, p.guardian_contact,
        p.city, p.country, p.pincode, p.consent_given, p.consent_timestamp,
        p.created_at AS profile_created_at, p.updated_at AS profile_updated_at
    FROM users u
    JOIN profiles p ON p.user_id = u.id
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_account_sqlite(pool: &SqlitePool, user: &User, profile: &Profile) -> Result<Account> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(INSERT_USER)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create user")?;
    let user_id = result.last_insert_rowid();

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read new user role")?;

    sqlx::query(INSERT_PROFILE)
        .bind(user_id)
        .bind(&profile.full_name)
        .bind(profile.age)
        .bind(profile.age_group.to_string())
        .bind(&profile.gender)
        .bind(&profile.guardian_name)
        .bind(&profile.guardian_contact)
        .bind(&profile.city)
        .bind(&profile.country)
        .bind(&profile.pincode)
        .bind(profile.consent_given)
        .bind(profile.consent_timestamp)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create profile")?;

    tx.commit().await.context("Failed to commit account")?;

    Ok(Account {
        user: User {
            id: user_id,
            role: UserRole::from_str(&role)?,
            ..user.clone()
        },
        profile: Profile {
            user_id,
            ..profile.clone()
        },
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE LOWER(email) = LOWER(?)", SELECT_USER))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

async fn get_account_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<Account>> {
    let row = sqlx::query(&format!("{} WHERE u.id = ?", SELECT_ACCOUNT))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get account")?;

    row.map(|r| row_to_account_sqlite(&r)).transpose()
}

async fn update_profile_sqlite(pool: &SqlitePool, profile: &Profile) -> Result<Profile> {
    let now = Utc::now();
    sqlx::query(UPDATE_PROFILE)
        .bind(&profile.full_name)
        .bind(profile.age)
        .bind(profile.age_group.to_string())
        .bind(&profile.gender)
        .bind(&profile.guardian_name)
        .bind(&profile.guardian_contact)
        .bind(&profile.city)
        .bind(&profile.country)
        .bind(&profile.pincode)
        .bind(now)
        .bind(profile.user_id)
        .execute(pool)
        .await
        .context("Failed to update profile")?;

    Ok(Profile {
        updated_at: now,
        ..profile.clone()
    })
}

async fn update_password_sqlite(pool: &SqlitePool, user_id: i64, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update password")?;

    Ok(())
}

async fn set_role_sqlite(pool: &SqlitePool, user_id: i64, role: UserRole) -> Result<()> {
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.to_string())
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to set user role")?;

    Ok(())
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_accounts_sqlite(pool: &SqlitePool) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!("{} ORDER BY u.created_at DESC, u.id DESC", SELECT_ACCOUNT))
        .fetch_all(pool)
        .await
        .context("Failed to list accounts")?;

    rows.iter().map(row_to_account_sqlite).collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: UserRole::from_str(&role)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    let user = row_to_user_sqlite(row)?;
    let age_group: String = row.get("age_group");
    let profile = Profile {
        user_id: user.id,
        full_name: row.get("full_name"),
        age: row.get("age"),
        age_group: AgeGroup::from_str(&age_group)?,
        gender: row.get("gender"),
        guardian_name: row.get("guardian_name"),
        guardian_contact: row.get("guardian_contact"),
        city: row.get("city"),
        country: row.get("country"),
        pincode: row.get("pincode"),
        consent_given: row.get("consent_given"),
        consent_timestamp: row.get("consent_timestamp"),
        created_at: row.get("profile_created_at"),
        updated_at: row.get("profile_updated_at"),
    };
    Ok(Account { user, profile })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_account_mysql(pool: &MySqlPool, user: &User, profile: &Profile) -> Result<Account> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(INSERT_USER)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create user")?;
    let user_id = result.last_insert_id() as i64;

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read new user role")?;

    sqlx::query(INSERT_PROFILE)
        .bind(user_id)
        .bind(&profile.full_name)
        .bind(profile.age)
        .bind(profile.age_group.to_string())
        .bind(&profile.gender)
        .bind(&profile.guardian_name)
        .bind(&profile.guardian_contact)
        .bind(&profile.city)
        .bind(&profile.country)
        .bind(&profile.pincode)
        .bind(profile.consent_given)
        .bind(profile.consent_timestamp)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create profile")?;

    tx.commit().await.context("Failed to commit account")?;

    Ok(Account {
        user: User {
            id: user_id,
            role: UserRole::from_str(&role)?,
            ..user.clone()
        },
        profile: Profile {
            user_id,
            ..profile.clone()
        },
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|r| row_to_user_mysql(&r)).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE LOWER(email) = LOWER(?)", SELECT_USER))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.map(|r| row_to_user_mysql(&r)).transpose()
}

async fn get_account_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<Account>> {
    let row = sqlx::query(&format!("{} WHERE u.id = ?", SELECT_ACCOUNT))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get account")?;

    row.map(|r| row_to_account_mysql(&r)).transpose()
}

async fn update_profile_mysql(pool: &MySqlPool, profile: &Profile) -> Result<Profile> {
    let now = Utc::now();
    sqlx::query(UPDATE_PROFILE)
        .bind(&profile.full_name)
        .bind(profile.age)
        .bind(profile.age_group.to_string())
        .bind(&profile.gender)
        .bind(&profile.guardian_name)
        .bind(&profile.guardian_contact)
        .bind(&profile.city)
        .bind(&profile.country)
        .bind(&profile.pincode)
        .bind(now)
        .bind(profile.user_id)
        .execute(pool)
        .await
        .context("Failed to update profile")?;

    Ok(Profile {
        updated_at: now,
        ..profile.clone()
    })
}

async fn update_password_mysql(pool: &MySqlPool, user_id: i64, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update password")?;

    Ok(())
}

async fn set_role_mysql(pool: &MySqlPool, user_id: i64, role: UserRole) -> Result<()> {
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.to_string())
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to set user role")?;

    Ok(())
}

async fn count_users_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_accounts_mysql(pool: &MySqlPool) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!("{} ORDER BY u.created_at DESC, u.id DESC", SELECT_ACCOUNT))
        .fetch_all(pool)
        .await
        .context("Failed to list accounts")?;

    rows.iter().map(row_to_account_mysql).collect()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role: String = row.get("role");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: UserRole::from_str(&role)?,
        created_at,
        updated_at,
    })
}

fn row_to_account_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Account> {
    let user = row_to_user_mysql(row)?;
    let age_group: String = row.get("age_group");
    let profile = Profile {
        user_id: user.id,
        full_name: row.get("full_name"),
        age: row.get("age"),
        age_group: AgeGroup::from_str(&age_group)?,
        gender: row.get("gender"),
        guardian_name: row.get("guardian_name"),
        guardian_contact: row.get("guardian_contact"),
        city: row.get("city"),
        country: row.get("country"),
        pincode: row.get("pincode"),
        consent_given: row.get("consent_given"),
        consent_timestamp: row.get("consent_timestamp"),
        created_at: row.get("profile_created_at"),
        updated_at: row.get("profile_updated_at"),
    };
    Ok(Account { user, profile })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::ProfileInput;

    /// Store an account with the given age and return it
    pub async fn create_test_account(pool: &DynDatabasePool, email: &str, age: i32) -> Account {
        let repo = SqlxUserRepository::new(pool.clone());
        let user = User::new(email.to_string(), "hash".to_string(), UserRole::User);
        let profile = ProfileInput {
            full_name: format!("Reader {}", email),
            age,
            country: Some("India".to_string()),
            ..ProfileInput::default()
        }
        .into_profile(0, true)
        .expect("age in range");
        repo.create_account(&user, &profile)
            .await
            .expect("Failed to create account")
    }
}
