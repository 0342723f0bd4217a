//! Feedback and question repository
//!
//! One implementation serves both tables; the table is chosen by
//! [`InquiryKind`] and never comes from user input.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Inquiry, InquiryKind, InquiryWithNames};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Inquiry repository trait
#[async_trait]
pub trait InquiryRepository: Send + Sync {
    async fn create(&self, kind: InquiryKind, inquiry: &Inquiry) -> Result<Inquiry>;

    async fn get_by_id(&self, kind: InquiryKind, id: i64) -> Result<Option<Inquiry>>;

    /// A reader's own submissions, newest first
    async fn list_by_user(&self, kind: InquiryKind, user_id: i64) -> Result<Vec<Inquiry>>;

    /// Every submission with author and responder names, newest first
    async fn list_all_with_names(&self, kind: InquiryKind) -> Result<Vec<InquiryWithNames>>;

    /// Store the staff reply. Returns false if the inquiry does not exist.
    async fn respond(
        &self,
        kind: InquiryKind,
        id: i64,
        response: &str,
        responder_id: i64,
        responded_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn count_unanswered(&self, kind: InquiryKind) -> Result<i64>;
}

/// SQLx-based inquiry repository implementation
pub struct SqlxInquiryRepository {
    pool: DynDatabasePool,
}

impl SqlxInquiryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InquiryRepository> {
        Arc::new(Self::new(pool))
    }
}

const INQUIRY_COLUMNS: &str =
    "id, user_id, text, admin_response, responded_by, responded_at, created_at, updated_at";

#[async_trait]
impl InquiryRepository for SqlxInquiryRepository {
    async fn create(&self, kind: InquiryKind, inquiry: &Inquiry) -> Result<Inquiry> {
        let sql = format!(
            "INSERT INTO {} (user_id, text, created_at, updated_at) VALUES (?, ?, ?, ?)",
            kind.table()
        );
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(inquiry.user_id)
                .bind(&inquiry.text)
                .bind(inquiry.created_at)
                .bind(inquiry.updated_at)
                .execute(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to create {}", kind))?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(inquiry.user_id)
                .bind(&inquiry.text)
                .bind(inquiry.created_at)
                .bind(inquiry.updated_at)
                .execute(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to create {}", kind))?
                .last_insert_id() as i64,
        };

        Ok(Inquiry {
            id,
            ..inquiry.clone()
        })
    }

    async fn get_by_id(&self, kind: InquiryKind, id: i64) -> Result<Option<Inquiry>> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", INQUIRY_COLUMNS, kind.table());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to get {}", kind))?;
                Ok(row.as_ref().map(row_to_inquiry_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .with_context(|| format!("Failed to get {}", kind))?;
                Ok(row.as_ref().map(row_to_inquiry_mysql))
            }
        }
    }

    async fn list_by_user(&self, kind: InquiryKind, user_id: i64) -> Result<Vec<Inquiry>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            INQUIRY_COLUMNS,
            kind.table()
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to list {}", kind))?;
                Ok(rows.iter().map(row_to_inquiry_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .with_context(|| format!("Failed to list {}", kind))?;
                Ok(rows.iter().map(row_to_inquiry_mysql).collect())
            }
        }
    }

    async fn list_all_with_names(&self, kind: InquiryKind) -> Result<Vec<InquiryWithNames>> {
        let sql = with_names_sql(kind);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to list {}", kind))?;
                Ok(rows
                    .iter()
                    .map(|row| InquiryWithNames {
                        inquiry: row_to_inquiry_sqlite(row),
                        author_name: row.get("author_name"),
                        author_email: row.get("author_email"),
                        responder_name: row.get("responder_name"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .with_context(|| format!("Failed to list {}", kind))?;
                Ok(rows
                    .iter()
                    .map(|row| InquiryWithNames {
                        inquiry: row_to_inquiry_mysql(row),
                        author_name: row.get("author_name"),
                        author_email: row.get("author_email"),
                        responder_name: row.get("responder_name"),
                    })
                    .collect())
            }
        }
    }

    async fn respond(
        &self,
        kind: InquiryKind,
        id: i64,
        response: &str,
        responder_id: i64,
        responded_at: DateTime<Utc>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET admin_response = ?, responded_by = ?, responded_at = ?, updated_at = ? WHERE id = ?",
            kind.table()
        );
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(response)
                .bind(responder_id)
                .bind(responded_at)
                .bind(responded_at)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to respond to {}", kind))?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(response)
                .bind(responder_id)
                .bind(responded_at)
                .bind(responded_at)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to respond to {}", kind))?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_unanswered(&self, kind: InquiryKind) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE admin_response IS NULL",
            kind.table()
        );
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(&sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(&sql).fetch_one(self.pool.mysql()?).await,
        };
        count.with_context(|| format!("Failed to count unanswered {}", kind))
    }
}

fn with_names_sql(kind: InquiryKind) -> String {
    format!(
        r#"
        SELECT i.id, i.user_id, i.text, i.admin_response, i.responded_by, i.responded_at,
            i.created_at, i.updated_at,
            author.full_name AS author_name, u.email AS author_email,
            responder.full_name AS responder_name
        FROM {} i
        LEFT JOIN users u ON u.id = i.user_id
        LEFT JOIN profiles author ON author.user_id = i.user_id
        LEFT JOIN profiles responder ON responder.user_id = i.responded_by
        ORDER BY i.created_at DESC, i.id DESC
        "#,
        kind.table()
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_inquiry_sqlite(row: &sqlx::sqlite::SqliteRow) -> Inquiry {
    Inquiry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        text: row.get("text"),
        admin_response: row.get("admin_response"),
        responded_by: row.get("responded_by"),
        responded_at: row.get("responded_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_inquiry_mysql(row: &sqlx::mysql::MySqlRow) -> Inquiry {
    let responded_at: Option<DateTime<Utc>> = row.get("responded_at");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Inquiry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        text: row.get("text"),
        admin_response: row.get("admin_response"),
        responded_by: row.get("responded_by"),
        responded_at,
        created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::test_support::create_test_account;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxInquiryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxInquiryRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_kinds_use_separate_tables() {
        let (pool, repo) = setup_test_repo().await;
        let reader = create_test_account(&pool, "q@example.com", 13).await;

        repo.create(InquiryKind::Feedback, &Inquiry::new(reader.user.id, "Great".to_string()))
            .await
            .unwrap();
        repo.create(InquiryKind::Questions, &Inquiry::new(reader.user.id, "When?".to_string()))
            .await
            .unwrap();
        repo.create(InquiryKind::Questions, &Inquiry::new(reader.user.id, "Why?".to_string()))
            .await
            .unwrap();

        assert_eq!(repo.list_by_user(InquiryKind::Feedback, reader.user.id).await.unwrap().len(), 1);
        let questions = repo.list_by_user(InquiryKind::Questions, reader.user.id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, "Why?");
        assert_eq!(repo.count_unanswered(InquiryKind::Questions).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_respond_records_responder() {
        let (pool, repo) = setup_test_repo().await;
        let admin = create_test_account(&pool, "staff@example.com", 24).await;
        let reader = create_test_account(&pool, "kid@example.com", 9).await;

        let question = repo
            .create(InquiryKind::Questions, &Inquiry::new(reader.user.id, "Sequel?".to_string()))
            .await
            .unwrap();
        let at = Utc::now();
        assert!(repo
            .respond(InquiryKind::Questions, question.id, "Next spring", admin.user.id, at)
            .await
            .unwrap());
        assert!(!repo
            .respond(InquiryKind::Questions, 9999, "Nobody", admin.user.id, at)
            .await
            .unwrap());

        let stored = repo.get_by_id(InquiryKind::Questions, question.id).await.unwrap().unwrap();
        assert_eq!(stored.admin_response.as_deref(), Some("Next spring"));
        assert_eq!(stored.responded_by, Some(admin.user.id));
        assert!(stored.responded_at.is_some());
        assert_eq!(repo.count_unanswered(InquiryKind::Questions).await.unwrap(), 0);

        let inbox = repo.list_all_with_names(InquiryKind::Questions).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].author_name, Some(reader.profile.full_name.clone()));
        assert_eq!(inbox[0].responder_name, Some(admin.profile.full_name.clone()));
    }
}
