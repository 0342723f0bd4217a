//! Activity repository
//!
//! Reader submissions and staff-published worksheets share one table; a
//! published activity has no `user_id` and a `pdf_url`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Activity, ActivityStatus, ActivityWithMeta};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Activity repository trait
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn create(&self, activity: &Activity) -> Result<Activity>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Activity>>;

    /// Full-record update of the editable fields and status
    async fn update(&self, activity: &Activity) -> Result<Activity>;

    /// Returns false if no reader submission has this id
    async fn set_status(&self, id: i64, status: ActivityStatus) -> Result<bool>;

    /// Returns false if the activity does not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// A reader's own submissions, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Activity>>;

    /// Staff worksheets, newest first
    async fn list_published(&self) -> Result<Vec<Activity>>;

    /// Every activity with submitter and book context, newest first
    async fn list_all_with_meta(&self) -> Result<Vec<ActivityWithMeta>>;

    async fn count(&self) -> Result<i64>;

    async fn count_by_user(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based activity repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxActivityRepository {
    pool: DynDatabasePool,
}

impl SqlxActivityRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ActivityRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ActivityRepository for SqlxActivityRepository {
    async fn create(&self, activity: &Activity) -> Result<Activity> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_activity_sqlite(self.pool.sqlite()?, activity).await,
            DatabaseDriver::Mysql => create_activity_mysql(self.pool.mysql()?, activity).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Activity>> {
        let sql = format!("SELECT {} FROM activities WHERE id = ?", ACTIVITY_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get activity by ID")?;
                row.map(|r| row_to_activity_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get activity by ID")?;
                row.map(|r| row_to_activity_mysql(&r)).transpose()
            }
        }
    }

    async fn update(&self, activity: &Activity) -> Result<Activity> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_activity_sqlite(self.pool.sqlite()?, activity).await,
            DatabaseDriver::Mysql => update_activity_mysql(self.pool.mysql()?, activity).await,
        }
    }

    async fn set_status(&self, id: i64, status: ActivityStatus) -> Result<bool> {
        let sql = "UPDATE activities SET status = ?, updated_at = ? WHERE id = ? AND user_id IS NOT NULL";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.to_string())
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to set activity status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.to_string())
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to set activity status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM activities WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete activity")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete activity")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Activity>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_activities_sqlite(self.pool.sqlite()?, "user_id = ?", Some(user_id)).await
            }
            DatabaseDriver::Mysql => {
                list_activities_mysql(self.pool.mysql()?, "user_id = ?", Some(user_id)).await
            }
        }
    }

    async fn list_published(&self) -> Result<Vec<Activity>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_activities_sqlite(self.pool.sqlite()?, PUBLISHED_FILTER, None).await
            }
            DatabaseDriver::Mysql => {
                list_activities_mysql(self.pool.mysql()?, PUBLISHED_FILTER, None).await
            }
        }
    }

    async fn list_all_with_meta(&self) -> Result<Vec<ActivityWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_with_meta_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_with_meta_mysql(self.pool.mysql()?).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM activities";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        };
        count.context("Failed to count activities")
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM activities WHERE user_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql).bind(user_id).fetch_one(self.pool.sqlite()?).await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql).bind(user_id).fetch_one(self.pool.mysql()?).await
            }
        };
        count.context("Failed to count user activities")
    }
}

const ACTIVITY_COLUMNS: &str = "id, user_id, book_id, chapter_id, title, description, file_url, \
     file_name, pdf_url, cover_url, status, created_at, updated_at";

const PUBLISHED_FILTER: &str = "user_id IS NULL AND pdf_url IS NOT NULL";

const INSERT_ACTIVITY: &str = r#"
    INSERT INTO activities (user_id, book_id, chapter_id, title, description, file_url,
        file_name, pdf_url, cover_url, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_ACTIVITY: &str = r#"
    UPDATE activities
    SET book_id = ?, chapter_id = ?, title = ?, description = ?, file_url = ?, file_name = ?,
        pdf_url = ?, cover_url = ?, status = ?, updated_at = ?
    WHERE id = ?
"#;

const SELECT_WITH_META: &str = r#"
    SELECT a.id, a.user_id, a.book_id, a.chapter_id, a.title, a.description, a.file_url,
        a.file_name, a.pdf_url, a.cover_url, a.status, a.created_at, a.updated_at,
        p.full_name AS submitter_name, u.email AS submitter_email,
        b.title AS book_title, c.title AS chapter_title, c.chapter_number AS chapter_number
    FROM activities a
    LEFT JOIN users u ON u.id = a.user_id
    LEFT JOIN profiles p ON p.user_id = a.user_id
    LEFT JOIN books b ON b.id = a.book_id
    LEFT JOIN chapters c ON c.id = a.chapter_id
    ORDER BY a.created_at DESC, a.id DESC
"#;

fn list_sql(filter: &str) -> String {
    format!(
        "SELECT {} FROM activities WHERE {} ORDER BY created_at DESC, id DESC",
        ACTIVITY_COLUMNS, filter
    )
}

fn parse_status(value: &str) -> Result<ActivityStatus> {
    ActivityStatus::from_str(value).map_err(|e| anyhow!(e))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_activity_sqlite(pool: &SqlitePool, activity: &Activity) -> Result<Activity> {
    let result = sqlx::query(INSERT_ACTIVITY)
        .bind(activity.user_id)
        .bind(activity.book_id)
        .bind(activity.chapter_id)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.file_url)
        .bind(&activity.file_name)
        .bind(&activity.pdf_url)
        .bind(&activity.cover_url)
        .bind(activity.status.to_string())
        .bind(activity.created_at)
        .bind(activity.updated_at)
        .execute(pool)
        .await
        .context("Failed to create activity")?;

    Ok(Activity {
        id: result.last_insert_rowid(),
        ..activity.clone()
    })
}

async fn update_activity_sqlite(pool: &SqlitePool, activity: &Activity) -> Result<Activity> {
    let now = Utc::now();
    sqlx::query(UPDATE_ACTIVITY)
        .bind(activity.book_id)
        .bind(activity.chapter_id)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.file_url)
        .bind(&activity.file_name)
        .bind(&activity.pdf_url)
        .bind(&activity.cover_url)
        .bind(activity.status.to_string())
        .bind(now)
        .bind(activity.id)
        .execute(pool)
        .await
        .context("Failed to update activity")?;

    Ok(Activity {
        updated_at: now,
        ..activity.clone()
    })
}

async fn list_activities_sqlite(
    pool: &SqlitePool,
    filter: &str,
    user_id: Option<i64>,
) -> Result<Vec<Activity>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql);
    if let Some(user_id) = user_id {
        query = query.bind(user_id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list activities")?;

    rows.iter().map(row_to_activity_sqlite).collect()
}

async fn list_with_meta_sqlite(pool: &SqlitePool) -> Result<Vec<ActivityWithMeta>> {
    let rows = sqlx::query(SELECT_WITH_META)
        .fetch_all(pool)
        .await
        .context("Failed to list activities")?;

    rows.iter()
        .map(|row| {
            Ok(ActivityWithMeta {
                activity: row_to_activity_sqlite(row)?,
                submitter_name: row.get("submitter_name"),
                submitter_email: row.get("submitter_email"),
                book_title: row.get("book_title"),
                chapter_title: row.get("chapter_title"),
                chapter_number: row.get("chapter_number"),
            })
        })
        .collect()
}

fn row_to_activity_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Activity> {
    let status: String = row.get("status");
    Ok(Activity {
        id: row.get("id"),
        user_id: row.get("user_id"),
        book_id: row.get("book_id"),
        chapter_id: row.get("chapter_id"),
        title: row.get("title"),
        description: row.get("description"),
        file_url: row.get("file_url"),
        file_name: row.get("file_name"),
        pdf_url: row.get("pdf_url"),
        cover_url: row.get("cover_url"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_activity_mysql(pool: &MySqlPool, activity: &Activity) -> Result<Activity> {
    let result = sqlx::query(INSERT_ACTIVITY)
        .bind(activity.user_id)
        .bind(activity.book_id)
        .bind(activity.chapter_id)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.file_url)
        .bind(&activity.file_name)
        .bind(&activity.pdf_url)
        .bind(&activity.cover_url)
        .bind(activity.status.to_string())
        .bind(activity.created_at)
        .bind(activity.updated_at)
        .execute(pool)
        .await
        .context("Failed to create activity")?;

    Ok(Activity {
        id: result.last_insert_id() as i64,
        ..activity.clone()
    })
}

async fn update_activity_mysql(pool: &MySqlPool, activity: &Activity) -> Result<Activity> {
    let now = Utc::now();
    sqlx::query(UPDATE_ACTIVITY)
        .bind(activity.book_id)
        .bind(activity.chapter_id)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.file_url)
        .bind(&activity.file_name)
        .bind(&activity.pdf_url)
        .bind(&activity.cover_url)
        .bind(activity.status.to_string())
        .bind(now)
        .bind(activity.id)
        .execute(pool)
        .await
        .context("Failed to update activity")?;

    Ok(Activity {
        updated_at: now,
        ..activity.clone()
    })
}

async fn list_activities_mysql(
    pool: &MySqlPool,
    filter: &str,
    user_id: Option<i64>,
) -> Result<Vec<Activity>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql);
    if let Some(user_id) = user_id {
        query = query.bind(user_id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list activities")?;

    rows.iter().map(row_to_activity_mysql).collect()
}

async fn list_with_meta_mysql(pool: &MySqlPool) -> Result<Vec<ActivityWithMeta>> {
    let rows = sqlx::query(SELECT_WITH_META)
        .fetch_all(pool)
        .await
        .context("Failed to list activities")?;

    rows.iter()
        .map(|row| {
            Ok(ActivityWithMeta {
                activity: row_to_activity_mysql(row)?,
                submitter_name: row.get("submitter_name"),
                submitter_email: row.get("submitter_email"),
                book_title: row.get("book_title"),
                chapter_title: row.get("chapter_title"),
                chapter_number: row.get("chapter_number"),
            })
        })
        .collect()
}

fn row_to_activity_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Activity> {
    let status: String = row.get("status");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Ok(Activity {
        id: row.get("id"),
        user_id: row.get("user_id"),
        book_id: row.get("book_id"),
        chapter_id: row.get("chapter_id"),
        title: row.get("title"),
        description: row.get("description"),
        file_url: row.get("file_url"),
        file_name: row.get("file_name"),
        pdf_url: row.get("pdf_url"),
        cover_url: row.get("cover_url"),
        status: parse_status(&status)?,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::book::test_support::create_test_book;
    use crate::db::repositories::chapter::test_support::append_test_chapter;
    use crate::db::repositories::user::test_support::create_test_account;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{AgeGroup, PublishActivityInput, SubmitActivityInput};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxActivityRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxActivityRepository::new(pool.clone());
        (pool, repo)
    }

    fn submission(user_id: i64, title: &str) -> Activity {
        Activity::submission(
            user_id,
            SubmitActivityInput {
                title: title.to_string(),
                ..SubmitActivityInput::default()
            },
        )
    }

    fn worksheet(title: &str) -> Activity {
        Activity::published(PublishActivityInput {
            title: title.to_string(),
            pdf_url: Some(format!("/files/{}.pdf", title)),
            ..PublishActivityInput::default()
        })
    }

    #[tokio::test]
    async fn test_user_and_published_lists_are_separate() {
        let (pool, repo) = setup_test_repo().await;
        let reader = create_test_account(&pool, "reader@example.com", 11).await;

        repo.create(&submission(reader.user.id, "Drawing")).await.unwrap();
        repo.create(&worksheet("Puzzle")).await.unwrap();

        let mine = repo.list_by_user(reader.user.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Drawing");

        let published = repo.list_published().await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "Puzzle");

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_by_user(reader.user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_with_meta_joins_context() {
        let (pool, repo) = setup_test_repo().await;
        let reader = create_test_account(&pool, "meta@example.com", 15).await;
        let book = create_test_book(&pool, "Nebula", AgeGroup::Teens).await;
        let chapter = append_test_chapter(&pool, book.id, "Arrival").await;

        let mut activity = submission(reader.user.id, "Essay");
        activity.book_id = Some(book.id);
        activity.chapter_id = Some(chapter.id);
        repo.create(&activity).await.unwrap();
        repo.create(&worksheet("Quiz")).await.unwrap();

        let all = repo.list_all_with_meta().await.unwrap();
        assert_eq!(all.len(), 2);
        let essay = all.iter().find(|a| a.activity.title == "Essay").unwrap();
        assert_eq!(essay.submitter_email.as_deref(), Some("meta@example.com"));
        assert_eq!(essay.book_title.as_deref(), Some("Nebula"));
        assert_eq!(essay.chapter_title.as_deref(), Some("Arrival"));
        assert_eq!(essay.chapter_number, Some(1));

        let quiz = all.iter().find(|a| a.activity.title == "Quiz").unwrap();
        assert!(quiz.submitter_name.is_none());
    }

    #[tokio::test]
    async fn test_set_status_and_delete() {
        let (pool, repo) = setup_test_repo().await;
        let reader = create_test_account(&pool, "st@example.com", 15).await;
        let created = repo.create(&submission(reader.user.id, "Poem")).await.unwrap();

        assert!(repo.set_status(created.id, ActivityStatus::Reviewed).await.unwrap());
        let stored = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActivityStatus::Reviewed);

        assert!(!repo.set_status(9999, ActivityStatus::Approved).await.unwrap());

        let sheet = repo.create(&worksheet("Sheet")).await.unwrap();
        assert!(!repo.set_status(sheet.id, ActivityStatus::Rejected).await.unwrap());
        let sheet = repo.get_by_id(sheet.id).await.unwrap().unwrap();
        assert_eq!(sheet.status, ActivityStatus::Approved);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleting_book_detaches_activity() {
        let (pool, repo) = setup_test_repo().await;
        let book = create_test_book(&pool, "Short-lived", AgeGroup::Teens).await;
        let mut sheet = worksheet("Linked");
        sheet.book_id = Some(book.id);
        let created = repo.create(&sheet).await.unwrap();

        crate::db::repositories::SqlxBookRepository::boxed(pool.clone())
            .delete(book.id)
            .await
            .unwrap();

        let stored = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert!(stored.book_id.is_none());
    }
}
