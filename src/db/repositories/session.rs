//! Session and password reset repositories
//!
//! Both tables hold opaque expiring tokens owned by a user. A session id is
//! the bearer token handed out at login; a reset token is mailed to the
//! user and consumed once.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{PasswordReset, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Sign a user out everywhere
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Purge sessions past `now`, returning how many were removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Password reset token repository trait
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(&self, reset: &PasswordReset) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<PasswordReset>>;

    /// Remove a token. Returns false if it was already gone.
    async fn consume(&self, token: &str) -> Result<bool>;

    /// Drop every outstanding token of a user
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

/// SQLx-based password reset repository implementation
pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.sqlite()?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(self.pool.mysql()?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_session_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exec_sqlite(self.pool.sqlite()?, sql, id, "Failed to delete session").await?
            }
            DatabaseDriver::Mysql => {
                exec_mysql(self.pool.mysql()?, sql, id, "Failed to delete session").await?
            }
        };
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE user_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exec_sqlite(self.pool.sqlite()?, sql, user_id, "Failed to delete user sessions").await
            }
            DatabaseDriver::Mysql => {
                exec_mysql(self.pool.mysql()?, sql, user_id, "Failed to delete user sessions").await
            }
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exec_sqlite(self.pool.sqlite()?, sql, now, "Failed to delete expired sessions").await
            }
            DatabaseDriver::Mysql => {
                exec_mysql(self.pool.mysql()?, sql, now, "Failed to delete expired sessions").await
            }
        }
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(&self, reset: &PasswordReset) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_reset_sqlite(self.pool.sqlite()?, reset).await,
            DatabaseDriver::Mysql => create_reset_mysql(self.pool.mysql()?, reset).await,
        }
    }

    async fn get(&self, token: &str) -> Result<Option<PasswordReset>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_reset_sqlite(self.pool.sqlite()?, token).await,
            DatabaseDriver::Mysql => get_reset_mysql(self.pool.mysql()?, token).await,
        }
    }

    async fn consume(&self, token: &str) -> Result<bool> {
        let sql = "DELETE FROM password_resets WHERE token = ?";
        let removed = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exec_sqlite(self.pool.sqlite()?, sql, token, "Failed to consume reset token").await?
            }
            DatabaseDriver::Mysql => {
                exec_mysql(self.pool.mysql()?, sql, token, "Failed to consume reset token").await?
            }
        };
        Ok(removed == 1)
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let sql = "DELETE FROM password_resets WHERE user_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exec_sqlite(self.pool.sqlite()?, sql, user_id, "Failed to delete reset tokens").await
            }
            DatabaseDriver::Mysql => {
                exec_mysql(self.pool.mysql()?, sql, user_id, "Failed to delete reset tokens").await
            }
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let sql = "DELETE FROM password_resets WHERE expires_at < ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exec_sqlite(self.pool.sqlite()?, sql, now, "Failed to delete expired reset tokens").await
            }
            DatabaseDriver::Mysql => {
                exec_mysql(self.pool.mysql()?, sql, now, "Failed to delete expired reset tokens").await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn exec_sqlite<'q, T>(pool: &SqlitePool, sql: &'q str, arg: T, context: &'static str) -> Result<u64>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let result = sqlx::query(sql)
        .bind(arg)
        .execute(pool)
        .await
        .context(context)?;
    Ok(result.rows_affected())
}

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn create_reset_sqlite(pool: &SqlitePool, reset: &PasswordReset) -> Result<()> {
    sqlx::query("INSERT INTO password_resets (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&reset.token)
        .bind(reset.user_id)
        .bind(reset.expires_at)
        .bind(reset.created_at)
        .execute(pool)
        .await
        .context("Failed to create reset token")?;

    Ok(())
}

async fn get_reset_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<PasswordReset>> {
    let row = sqlx::query(
        "SELECT token, user_id, expires_at, created_at FROM password_resets WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get reset token")?;

    Ok(row.map(|row| PasswordReset {
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn exec_mysql<'q, T>(pool: &MySqlPool, sql: &'q str, arg: T, context: &'static str) -> Result<u64>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    let result = sqlx::query(sql)
        .bind(arg)
        .execute(pool)
        .await
        .context(context)?;
    Ok(result.rows_affected())
}

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn create_reset_mysql(pool: &MySqlPool, reset: &PasswordReset) -> Result<()> {
    sqlx::query("INSERT INTO password_resets (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&reset.token)
        .bind(reset.user_id)
        .bind(reset.expires_at)
        .bind(reset.created_at)
        .execute(pool)
        .await
        .context("Failed to create reset token")?;

    Ok(())
}

async fn get_reset_mysql(pool: &MySqlPool, token: &str) -> Result<Option<PasswordReset>> {
    let row = sqlx::query(
        "SELECT token, user_id, expires_at, created_at FROM password_resets WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get reset token")?;

    Ok(row.map(|row| PasswordReset {
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::test_support::create_test_account;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;
    use uuid::Uuid;

    async fn setup() -> (DynDatabasePool, SqlxSessionRepository, SqlxPasswordResetRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (
            pool.clone(),
            SqlxSessionRepository::new(pool.clone()),
            SqlxPasswordResetRepository::new(pool),
        )
    }

    fn session_for(user_id: i64, expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    fn reset_for(user_id: i64, expires_in: Duration) -> PasswordReset {
        let now = Utc::now();
        PasswordReset {
            token: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (pool, sessions, _) = setup().await;
        let account = create_test_account(&pool, "s@example.com", 15).await;

        let session = session_for(account.user.id, Duration::days(7));
        sessions.create(&session).await.unwrap();

        let found = sessions.get_by_id(&session.id).await.unwrap().expect("Session not found");
        assert_eq!(found.user_id, account.user.id);
        assert!(!found.is_expired());

        sessions.delete(&session.id).await.unwrap();
        assert!(sessions.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user_keeps_others() {
        let (pool, sessions, _) = setup().await;
        let alice = create_test_account(&pool, "alice@example.com", 15).await;
        let bob = create_test_account(&pool, "bob@example.com", 15).await;

        let a1 = session_for(alice.user.id, Duration::days(7));
        let a2 = session_for(alice.user.id, Duration::days(7));
        let b1 = session_for(bob.user.id, Duration::days(7));
        for s in [&a1, &a2, &b1] {
            sessions.create(s).await.unwrap();
        }

        assert_eq!(sessions.delete_by_user(alice.user.id).await.unwrap(), 2);
        assert!(sessions.get_by_id(&a1.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&b1.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (pool, sessions, _) = setup().await;
        let account = create_test_account(&pool, "e@example.com", 15).await;

        let expired = session_for(account.user.id, Duration::days(-1));
        let valid = session_for(account.user.id, Duration::days(7));
        sessions.create(&expired).await.unwrap();
        sessions.create(&valid).await.unwrap();

        assert_eq!(sessions.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(sessions.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&valid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reset_token_is_consumed_once() {
        let (pool, _, resets) = setup().await;
        let account = create_test_account(&pool, "r@example.com", 15).await;

        let reset = reset_for(account.user.id, Duration::hours(1));
        resets.create(&reset).await.unwrap();
        assert!(resets.get(&reset.token).await.unwrap().is_some());

        assert!(resets.consume(&reset.token).await.unwrap());
        assert!(!resets.consume(&reset.token).await.unwrap());
        assert!(resets.get(&reset.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_reset_tokens() {
        let (pool, _, resets) = setup().await;
        let account = create_test_account(&pool, "x@example.com", 15).await;

        let stale = reset_for(account.user.id, Duration::minutes(-5));
        let fresh = reset_for(account.user.id, Duration::minutes(55));
        resets.create(&stale).await.unwrap();
        resets.create(&fresh).await.unwrap();

        assert_eq!(resets.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(resets.get(&fresh.token).await.unwrap().unwrap().expires_at > Utc::now());
        assert_eq!(resets.delete_by_user(account.user.id).await.unwrap(), 1);
    }
}
