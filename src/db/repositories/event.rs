//! Event repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Event;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Event repository trait
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>>;

    async fn update(&self, event: &Event) -> Result<Event>;

    /// Returns false if the event does not exist
    async fn set_visibility(&self, id: i64, visible: bool) -> Result<bool>;

    /// Returns false if the event does not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Every event, latest date first
    async fn list_all(&self) -> Result<Vec<Event>>;

    /// Visible events, earliest date first
    async fn list_visible(&self) -> Result<Vec<Event>>;

    async fn count(&self) -> Result<i64>;

    /// Visible events dated `today` or later
    async fn count_upcoming(&self, today: NaiveDate) -> Result<i64>;
}

/// SQLx-based event repository implementation
pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &Event) -> Result<Event> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_event_sqlite(self.pool.sqlite()?, event).await,
            DatabaseDriver::Mysql => create_event_mysql(self.pool.mysql()?, event).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get event by ID")?;
                Ok(row.as_ref().map(row_to_event_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get event by ID")?;
                Ok(row.as_ref().map(row_to_event_mysql))
            }
        }
    }

    async fn update(&self, event: &Event) -> Result<Event> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_event_sqlite(self.pool.sqlite()?, event).await,
            DatabaseDriver::Mysql => update_event_mysql(self.pool.mysql()?, event).await,
        }
    }

    async fn set_visibility(&self, id: i64, visible: bool) -> Result<bool> {
        let sql = "UPDATE events SET visible = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(visible)
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to set event visibility")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(visible)
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to set event visibility")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM events WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete event")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete event")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_all(&self) -> Result<Vec<Event>> {
        self.list(false).await
    }

    async fn list_visible(&self) -> Result<Vec<Event>> {
        self.list(true).await
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM events";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        };
        count.context("Failed to count events")
    }

    async fn count_upcoming(&self, today: NaiveDate) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM events WHERE visible = ? AND event_date >= ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(true)
                    .bind(today)
                    .fetch_one(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(true)
                    .bind(today)
                    .fetch_one(self.pool.mysql()?)
                    .await
            }
        };
        count.context("Failed to count upcoming events")
    }
}

impl SqlxEventRepository {
    /// Admin view: latest first. Reader view: visible only, soonest first.
    async fn list(&self, visible_only: bool) -> Result<Vec<Event>> {
        let sql = if visible_only {
            format!(
                "SELECT {} FROM events WHERE visible = ? ORDER BY event_date ASC, event_time ASC, id ASC",
                EVENT_COLUMNS
            )
        } else {
            format!("SELECT {} FROM events ORDER BY event_date DESC, id DESC", EVENT_COLUMNS)
        };
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if visible_only {
                    query = query.bind(true);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list events")?;
                Ok(rows.iter().map(row_to_event_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if visible_only {
                    query = query.bind(true);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list events")?;
                Ok(rows.iter().map(row_to_event_mysql).collect())
            }
        }
    }
}

const EVENT_COLUMNS: &str = "id, title, description, event_date, event_time, video_url, \
     learn_more_url, hero_image_url, visible, created_at, updated_at";

const INSERT_EVENT: &str = r#"
    INSERT INTO events (title, description, event_date, event_time, video_url,
        learn_more_url, hero_image_url, visible, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_EVENT: &str = r#"
    UPDATE events
    SET title = ?, description = ?, event_date = ?, event_time = ?, video_url = ?,
        learn_more_url = ?, hero_image_url = ?, visible = ?, updated_at = ?
    WHERE id = ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_event_sqlite(pool: &SqlitePool, event: &Event) -> Result<Event> {
    let result = sqlx::query(INSERT_EVENT)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(&event.event_time)
        .bind(&event.video_url)
        .bind(&event.learn_more_url)
        .bind(&event.hero_image_url)
        .bind(event.visible)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(pool)
        .await
        .context("Failed to create event")?;

    Ok(Event {
        id: result.last_insert_rowid(),
        ..event.clone()
    })
}

async fn update_event_sqlite(pool: &SqlitePool, event: &Event) -> Result<Event> {
    let now = Utc::now();
    sqlx::query(UPDATE_EVENT)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(&event.event_time)
        .bind(&event.video_url)
        .bind(&event.learn_more_url)
        .bind(&event.hero_image_url)
        .bind(event.visible)
        .bind(now)
        .bind(event.id)
        .execute(pool)
        .await
        .context("Failed to update event")?;

    Ok(Event {
        updated_at: now,
        ..event.clone()
    })
}

fn row_to_event_sqlite(row: &sqlx::sqlite::SqliteRow) -> Event {
    Event {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        event_date: row.get("event_date"),
        event_time: row.get("event_time"),
        video_url: row.get("video_url"),
        learn_more_url: row.get("learn_more_url"),
        hero_image_url: row.get("hero_image_url"),
        visible: row.get("visible"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_event_mysql(pool: &MySqlPool, event: &Event) -> Result<Event> {
    let result = sqlx::query(INSERT_EVENT)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(&event.event_time)
        .bind(&event.video_url)
        .bind(&event.learn_more_url)
        .bind(&event.hero_image_url)
        .bind(event.visible)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(pool)
        .await
        .context("Failed to create event")?;

    Ok(Event {
        id: result.last_insert_id() as i64,
        ..event.clone()
    })
}

async fn update_event_mysql(pool: &MySqlPool, event: &Event) -> Result<Event> {
    let now = Utc::now();
    sqlx::query(UPDATE_EVENT)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(&event.event_time)
        .bind(&event.video_url)
        .bind(&event.learn_more_url)
        .bind(&event.hero_image_url)
        .bind(event.visible)
        .bind(now)
        .bind(event.id)
        .execute(pool)
        .await
        .context("Failed to update event")?;

    Ok(Event {
        updated_at: now,
        ..event.clone()
    })
}

fn row_to_event_mysql(row: &sqlx::mysql::MySqlRow) -> Event {
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Event {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        event_date: row.get("event_date"),
        event_time: row.get("event_time"),
        video_url: row.get("video_url"),
        learn_more_url: row.get("learn_more_url"),
        hero_image_url: row.get("hero_image_url"),
        visible: row.get("visible"),
        created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::EventInput;

    async fn setup_test_repo() -> SqlxEventRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxEventRepository::new(pool)
    }

    fn event_on(title: &str, date: (i32, u32, u32), visible: bool) -> Event {
        Event::new(EventInput {
            title: title.to_string(),
            description: None,
            event_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            event_time: Some("10:30".to_string()),
            video_url: None,
            learn_more_url: None,
            hero_image_url: None,
            visible,
        })
    }

    #[tokio::test]
    async fn test_list_orders() {
        let repo = setup_test_repo().await;
        repo.create(&event_on("March", (2026, 3, 1), true)).await.unwrap();
        repo.create(&event_on("January", (2026, 1, 1), true)).await.unwrap();
        repo.create(&event_on("Hidden", (2026, 2, 1), false)).await.unwrap();

        let all: Vec<String> = repo.list_all().await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(all, vec!["March", "Hidden", "January"]);

        let visible: Vec<String> =
            repo.list_visible().await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(visible, vec!["January", "March"]);
    }

    #[tokio::test]
    async fn test_visibility_and_counts() {
        let repo = setup_test_repo().await;
        let past = repo.create(&event_on("Past", (2020, 5, 5), true)).await.unwrap();
        let future = repo.create(&event_on("Future", (2099, 5, 5), true)).await.unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_upcoming(today).await.unwrap(), 1);

        assert!(repo.set_visibility(future.id, false).await.unwrap());
        assert_eq!(repo.count_upcoming(today).await.unwrap(), 0);

        assert!(repo.delete(past.id).await.unwrap());
        assert!(!repo.delete(past.id).await.unwrap());
        assert!(!repo.set_visibility(past.id, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_event() {
        let repo = setup_test_repo().await;
        let mut event = repo.create(&event_on("Draft", (2026, 6, 1), true)).await.unwrap();
        event.title = "Launch".to_string();
        event.event_time = None;
        repo.update(&event).await.unwrap();

        let stored = repo.get_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Launch");
        assert!(stored.event_time.is_none());
        assert_eq!(stored.event_date, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
    }
}
