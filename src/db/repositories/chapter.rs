//! Chapter repository
//!
//! Every write that touches `order_index` runs in a single transaction so a
//! book's chapters always hold the positions `1..=N`. The unique
//! `(book_id, order_index)` key is checked per row, so shifts go through
//! negative values first and are flipped back in a second statement.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Chapter, OrderSwap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

/// Chapter repository trait
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// Chapters of a book in reading order
    async fn list_by_book(&self, book_id: i64) -> Result<Vec<Chapter>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Chapter>>;

    /// Insert at the end of the book (`order_index = N + 1`)
    async fn create(&self, chapter: &Chapter) -> Result<Chapter>;

    /// Update title, number and links. Position and book are left alone.
    async fn update(&self, chapter: &Chapter) -> Result<Chapter>;

    /// Delete and shift later chapters down by one.
    /// Returns false if the chapter did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Exchange two positions if both rows still hold the indexes in `swap`.
    /// Returns false, with nothing written, when a guard fails.
    async fn swap_order(&self, swap: &OrderSwap) -> Result<bool>;

    /// Assign new positions to a book's chapters in one transaction
    async fn renumber(&self, book_id: i64, positions: &[(i64, i32)]) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based chapter repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxChapterRepository {
    pool: DynDatabasePool,
}

impl SqlxChapterRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChapterRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ChapterRepository for SqlxChapterRepository {
    async fn list_by_book(&self, book_id: i64) -> Result<Vec<Chapter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_chapters_sqlite(self.pool.sqlite()?, book_id).await,
            DatabaseDriver::Mysql => list_chapters_mysql(self.pool.mysql()?, book_id).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Chapter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_chapter_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_chapter_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn create(&self, chapter: &Chapter) -> Result<Chapter> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_chapter_sqlite(self.pool.sqlite()?, chapter).await,
            DatabaseDriver::Mysql => create_chapter_mysql(self.pool.mysql()?, chapter).await,
        }
    }

    async fn update(&self, chapter: &Chapter) -> Result<Chapter> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_chapter_sqlite(self.pool.sqlite()?, chapter).await,
            DatabaseDriver::Mysql => update_chapter_mysql(self.pool.mysql()?, chapter).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_chapter_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_chapter_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn swap_order(&self, swap: &OrderSwap) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => swap_order_sqlite(self.pool.sqlite()?, swap).await,
            DatabaseDriver::Mysql => swap_order_mysql(self.pool.mysql()?, swap).await,
        }
    }

    async fn renumber(&self, book_id: i64, positions: &[(i64, i32)]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => renumber_sqlite(self.pool.sqlite()?, book_id, positions).await,
            DatabaseDriver::Mysql => renumber_mysql(self.pool.mysql()?, book_id, positions).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM chapters";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        };
        count.context("Failed to count chapters")
    }
}

const CHAPTER_COLUMNS: &str = "id, book_id, title, chapter_number, order_index, cover_url, \
     pdf_url, created_at, updated_at";

const APPEND_CHAPTER: &str = r#"
    INSERT INTO chapters (book_id, title, chapter_number, order_index, cover_url, pdf_url,
        created_at, updated_at)
    SELECT ?, ?, ?, COALESCE(MAX(order_index), 0) + 1, ?, ?, ?, ?
    FROM chapters WHERE book_id = ?
"#;

const UPDATE_CHAPTER: &str = r#"
    UPDATE chapters
    SET title = ?, chapter_number = ?, cover_url = ?, pdf_url = ?, updated_at = ?
    WHERE id = ?
"#;

/// Move one row to a new index, guarded on the index it must still hold
const GUARDED_MOVE: &str =
    "UPDATE chapters SET order_index = ?, updated_at = ? WHERE id = ? AND book_id = ? AND order_index = ?";

const SHIFT_AFTER_DELETE: &str =
    "UPDATE chapters SET order_index = -(order_index - 1) WHERE book_id = ? AND order_index > ?";

const PARK_AT: &str = "UPDATE chapters SET order_index = ?, updated_at = ? WHERE id = ? AND book_id = ?";

const FLIP_NEGATIVE: &str =
    "UPDATE chapters SET order_index = -order_index WHERE book_id = ? AND order_index < 0";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_chapters_sqlite(pool: &SqlitePool, book_id: i64) -> Result<Vec<Chapter>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM chapters WHERE book_id = ? ORDER BY order_index ASC, id ASC",
        CHAPTER_COLUMNS
    ))
    .bind(book_id)
    .fetch_all(pool)
    .await
    .context("Failed to list chapters")?;

    Ok(rows.iter().map(row_to_chapter_sqlite).collect())
}

async fn get_chapter_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Chapter>> {
    let row = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = ?", CHAPTER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get chapter by ID")?;

    Ok(row.as_ref().map(row_to_chapter_sqlite))
}

async fn create_chapter_sqlite(pool: &SqlitePool, chapter: &Chapter) -> Result<Chapter> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(APPEND_CHAPTER)
        .bind(chapter.book_id)
        .bind(&chapter.title)
        .bind(chapter.chapter_number)
        .bind(&chapter.cover_url)
        .bind(&chapter.pdf_url)
        .bind(chapter.created_at)
        .bind(chapter.updated_at)
        .bind(chapter.book_id)
        .execute(&mut *tx)
        .await
        .context("Failed to create chapter")?;
    let id = result.last_insert_rowid();

    let order_index: i32 = sqlx::query_scalar("SELECT order_index FROM chapters WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read chapter position")?;

    tx.commit().await.context("Failed to commit chapter")?;

    Ok(Chapter {
        id,
        order_index,
        ..chapter.clone()
    })
}

async fn update_chapter_sqlite(pool: &SqlitePool, chapter: &Chapter) -> Result<Chapter> {
    let now = Utc::now();
    sqlx::query(UPDATE_CHAPTER)
        .bind(&chapter.title)
        .bind(chapter.chapter_number)
        .bind(&chapter.cover_url)
        .bind(&chapter.pdf_url)
        .bind(now)
        .bind(chapter.id)
        .execute(pool)
        .await
        .context("Failed to update chapter")?;

    Ok(Chapter {
        updated_at: now,
        ..chapter.clone()
    })
}

async fn delete_chapter_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let row = sqlx::query("SELECT book_id, order_index FROM chapters WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read chapter position")?;
    let Some(row) = row else {
        tx.rollback().await.context("Failed to roll back")?;
        return Ok(false);
    };
    let book_id: i64 = row.get("book_id");
    let order_index: i32 = row.get("order_index");

    sqlx::query("DELETE FROM chapters WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete chapter")?;
    sqlx::query(SHIFT_AFTER_DELETE)
        .bind(book_id)
        .bind(order_index)
        .execute(&mut *tx)
        .await
        .context("Failed to shift chapters")?;
    sqlx::query(FLIP_NEGATIVE)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("Failed to shift chapters")?;

    tx.commit().await.context("Failed to commit chapter delete")?;
    Ok(true)
}

async fn guarded_move_sqlite(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    book_id: i64,
    from: i32,
    to: i32,
) -> Result<bool> {
    let result = sqlx::query(GUARDED_MOVE)
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(book_id)
        .bind(from)
        .execute(&mut **tx)
        .await
        .context("Failed to move chapter")?;
    Ok(result.rows_affected() == 1)
}

async fn swap_order_sqlite(pool: &SqlitePool, swap: &OrderSwap) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let parked = -swap.moving_index;

    let applied = guarded_move_sqlite(&mut tx, swap.moving_id, swap.book_id, swap.moving_index, parked).await?
        && guarded_move_sqlite(&mut tx, swap.neighbour_id, swap.book_id, swap.neighbour_index, swap.moving_index).await?
        && guarded_move_sqlite(&mut tx, swap.moving_id, swap.book_id, parked, swap.neighbour_index).await?;

    if applied {
        tx.commit().await.context("Failed to commit chapter swap")?;
    } else {
        tx.rollback().await.context("Failed to roll back chapter swap")?;
    }
    Ok(applied)
}

async fn renumber_sqlite(pool: &SqlitePool, book_id: i64, positions: &[(i64, i32)]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let now = Utc::now();

    for &(id, index) in positions {
        sqlx::query(PARK_AT)
            .bind(-index)
            .bind(now)
            .bind(id)
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .context("Failed to renumber chapter")?;
    }
    sqlx::query(FLIP_NEGATIVE)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("Failed to renumber chapters")?;

    tx.commit().await.context("Failed to commit renumbering")?;
    Ok(())
}

fn row_to_chapter_sqlite(row: &sqlx::sqlite::SqliteRow) -> Chapter {
    Chapter {
        id: row.get("id"),
        book_id: row.get("book_id"),
        title: row.get("title"),
        chapter_number: row.get("chapter_number"),
        order_index: row.get("order_index"),
        cover_url: row.get("cover_url"),
        pdf_url: row.get("pdf_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_chapters_mysql(pool: &MySqlPool, book_id: i64) -> Result<Vec<Chapter>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM chapters WHERE book_id = ? ORDER BY order_index ASC, id ASC",
        CHAPTER_COLUMNS
    ))
    .bind(book_id)
    .fetch_all(pool)
    .await
    .context("Failed to list chapters")?;

    Ok(rows.iter().map(row_to_chapter_mysql).collect())
}

async fn get_chapter_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Chapter>> {
    let row = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = ?", CHAPTER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get chapter by ID")?;

    Ok(row.as_ref().map(row_to_chapter_mysql))
}

async fn create_chapter_mysql(pool: &MySqlPool, chapter: &Chapter) -> Result<Chapter> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Lock the book's rows so concurrent appends serialize
    sqlx::query("SELECT id FROM chapters WHERE book_id = ? FOR UPDATE")
        .bind(chapter.book_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to lock chapters")?;

    let result = sqlx::query(APPEND_CHAPTER)
        .bind(chapter.book_id)
        .bind(&chapter.title)
        .bind(chapter.chapter_number)
        .bind(&chapter.cover_url)
        .bind(&chapter.pdf_url)
        .bind(chapter.created_at)
        .bind(chapter.updated_at)
        .bind(chapter.book_id)
        .execute(&mut *tx)
        .await
        .context("Failed to create chapter")?;
    let id = result.last_insert_id() as i64;

    let order_index: i32 = sqlx::query_scalar("SELECT order_index FROM chapters WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read chapter position")?;

    tx.commit().await.context("Failed to commit chapter")?;

    Ok(Chapter {
        id,
        order_index,
        ..chapter.clone()
    })
}

async fn update_chapter_mysql(pool: &MySqlPool, chapter: &Chapter) -> Result<Chapter> {
    let now = Utc::now();
    sqlx::query(UPDATE_CHAPTER)
        .bind(&chapter.title)
        .bind(chapter.chapter_number)
        .bind(&chapter.cover_url)
        .bind(&chapter.pdf_url)
        .bind(now)
        .bind(chapter.id)
        .execute(pool)
        .await
        .context("Failed to update chapter")?;

    Ok(Chapter {
        updated_at: now,
        ..chapter.clone()
    })
}

async fn delete_chapter_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let row = sqlx::query("SELECT book_id, order_index FROM chapters WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read chapter position")?;
    let Some(row) = row else {
        tx.rollback().await.context("Failed to roll back")?;
        return Ok(false);
    };
    let book_id: i64 = row.get("book_id");
    let order_index: i32 = row.get("order_index");

    sqlx::query("DELETE FROM chapters WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete chapter")?;
    sqlx::query(SHIFT_AFTER_DELETE)
        .bind(book_id)
        .bind(order_index)
        .execute(&mut *tx)
        .await
        .context("Failed to shift chapters")?;
    sqlx::query(FLIP_NEGATIVE)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("Failed to shift chapters")?;

    tx.commit().await.context("Failed to commit chapter delete")?;
    Ok(true)
}

async fn guarded_move_mysql(
    tx: &mut Transaction<'_, MySql>,
    id: i64,
    book_id: i64,
    from: i32,
    to: i32,
) -> Result<bool> {
    let result = sqlx::query(GUARDED_MOVE)
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(book_id)
        .bind(from)
        .execute(&mut **tx)
        .await
        .context("Failed to move chapter")?;
    Ok(result.rows_affected() == 1)
}

async fn swap_order_mysql(pool: &MySqlPool, swap: &OrderSwap) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let parked = -swap.moving_index;

    let applied = guarded_move_mysql(&mut tx, swap.moving_id, swap.book_id, swap.moving_index, parked).await?
        && guarded_move_mysql(&mut tx, swap.neighbour_id, swap.book_id, swap.neighbour_index, swap.moving_index).await?
        && guarded_move_mysql(&mut tx, swap.moving_id, swap.book_id, parked, swap.neighbour_index).await?;

    if applied {
        tx.commit().await.context("Failed to commit chapter swap")?;
    } else {
        tx.rollback().await.context("Failed to roll back chapter swap")?;
    }
    Ok(applied)
}

async fn renumber_mysql(pool: &MySqlPool, book_id: i64, positions: &[(i64, i32)]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let now = Utc::now();

    for &(id, index) in positions {
        sqlx::query(PARK_AT)
            .bind(-index)
            .bind(now)
            .bind(id)
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .context("Failed to renumber chapter")?;
    }
    sqlx::query(FLIP_NEGATIVE)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("Failed to renumber chapters")?;

    tx.commit().await.context("Failed to commit renumbering")?;
    Ok(())
}

fn row_to_chapter_mysql(row: &sqlx::mysql::MySqlRow) -> Chapter {
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Chapter {
        id: row.get("id"),
        book_id: row.get("book_id"),
        title: row.get("title"),
        chapter_number: row.get("chapter_number"),
        order_index: row.get("order_index"),
        cover_url: row.get("cover_url"),
        pdf_url: row.get("pdf_url"),
        created_at,
        updated_at,
    }
}
