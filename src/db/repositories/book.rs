//! Book repository
//!
//! Database operations for books. Deleting a book cascades to its chapters
//! and detaches activities that referenced it.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{AgeGroup, Book};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Book repository trait
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, book: &Book) -> Result<Book>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>>;

    /// Full-record update
    async fn update(&self, book: &Book) -> Result<Book>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// All books, newest first
    async fn list(&self) -> Result<Vec<Book>>;

    /// Books of one age group, newest first
    async fn list_by_age_group(&self, age_group: AgeGroup) -> Result<Vec<Book>>;

    async fn count(&self) -> Result<i64>;

    async fn count_by_age_group(&self, age_group: AgeGroup) -> Result<i64>;
}

/// SQLx-based book repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxBookRepository {
    pool: DynDatabasePool,
}

impl SqlxBookRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookRepository for SqlxBookRepository {
    async fn create(&self, book: &Book) -> Result<Book> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_book_sqlite(self.pool.sqlite()?, book).await,
            DatabaseDriver::Mysql => create_book_mysql(self.pool.mysql()?, book).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_book_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_book_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update(&self, book: &Book) -> Result<Book> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_book_sqlite(self.pool.sqlite()?, book).await,
            DatabaseDriver::Mysql => update_book_mysql(self.pool.mysql()?, book).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM books WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete book")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM books WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete book")?;
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Book>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_books_sqlite(self.pool.sqlite()?, None).await,
            DatabaseDriver::Mysql => list_books_mysql(self.pool.mysql()?, None).await,
        }
    }

    async fn list_by_age_group(&self, age_group: AgeGroup) -> Result<Vec<Book>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_books_sqlite(self.pool.sqlite()?, Some(age_group)).await,
            DatabaseDriver::Mysql => list_books_mysql(self.pool.mysql()?, Some(age_group)).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM books";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        };
        count.context("Failed to count books")
    }

    async fn count_by_age_group(&self, age_group: AgeGroup) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM books WHERE age_group = ?";
        let group = age_group.to_string();
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql).bind(&group).fetch_one(self.pool.sqlite()?).await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql).bind(&group).fetch_one(self.pool.mysql()?).await
            }
        };
        count.context("Failed to count books by age group")
    }
}

const BOOK_COLUMNS: &str = "id, title, description, age_group, cover_url, amazon_link, \
     price_amount, price_currency, created_at, updated_at";

const INSERT_BOOK: &str = r#"
    INSERT INTO books (title, description, age_group, cover_url, amazon_link,
        price_amount, price_currency, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_BOOK: &str = r#"
    UPDATE books
    SET title = ?, description = ?, age_group = ?, cover_url = ?, amazon_link = ?,
        price_amount = ?, price_currency = ?, updated_at = ?
    WHERE id = ?
"#;

fn list_sql(filtered: bool) -> String {
    format!(
        "SELECT {} FROM books {} ORDER BY created_at DESC, id DESC",
        BOOK_COLUMNS,
        if filtered { "WHERE age_group = ?" } else { "" }
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_book_sqlite(pool: &SqlitePool, book: &Book) -> Result<Book> {
    let result = sqlx::query(INSERT_BOOK)
        .bind(&book.title)
        .bind(&book.description)
        .bind(book.age_group.to_string())
        .bind(&book.cover_url)
        .bind(&book.amazon_link)
        .bind(book.price_amount)
        .bind(&book.price_currency)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(pool)
        .await
        .context("Failed to create book")?;

    Ok(Book {
        id: result.last_insert_rowid(),
        ..book.clone()
    })
}

async fn get_book_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Book>> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get book by ID")?;

    row.map(|r| row_to_book_sqlite(&r)).transpose()
}

async fn update_book_sqlite(pool: &SqlitePool, book: &Book) -> Result<Book> {
    let now = Utc::now();
    sqlx::query(UPDATE_BOOK)
        .bind(&book.title)
        .bind(&book.description)
        .bind(book.age_group.to_string())
        .bind(&book.cover_url)
        .bind(&book.amazon_link)
        .bind(book.price_amount)
        .bind(&book.price_currency)
        .bind(now)
        .bind(book.id)
        .execute(pool)
        .await
        .context("Failed to update book")?;

    Ok(Book {
        updated_at: now,
        ..book.clone()
    })
}

async fn list_books_sqlite(pool: &SqlitePool, age_group: Option<AgeGroup>) -> Result<Vec<Book>> {
    let sql = list_sql(age_group.is_some());
    let mut query = sqlx::query(&sql);
    if let Some(group) = age_group {
        query = query.bind(group.to_string());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list books")?;

    rows.iter().map(row_to_book_sqlite).collect()
}

fn row_to_book_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Book> {
    let age_group: String = row.get("age_group");
    Ok(Book {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        age_group: AgeGroup::from_str(&age_group)?,
        cover_url: row.get("cover_url"),
        amazon_link: row.get("amazon_link"),
        price_amount: row.get("price_amount"),
        price_currency: row.get("price_currency"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_book_mysql(pool: &MySqlPool, book: &Book) -> Result<Book> {
    let result = sqlx::query(INSERT_BOOK)
        .bind(&book.title)
        .bind(&book.description)
        .bind(book.age_group.to_string())
        .bind(&book.cover_url)
        .bind(&book.amazon_link)
        .bind(book.price_amount)
        .bind(&book.price_currency)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(pool)
        .await
        .context("Failed to create book")?;

    Ok(Book {
        id: result.last_insert_id() as i64,
        ..book.clone()
    })
}

async fn get_book_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Book>> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get book by ID")?;

    row.map(|r| row_to_book_mysql(&r)).transpose()
}

async fn update_book_mysql(pool: &MySqlPool, book: &Book) -> Result<Book> {
    let now = Utc::now();
    sqlx::query(UPDATE_BOOK)
        .bind(&book.title)
        .bind(&book.description)
        .bind(book.age_group.to_string())
        .bind(&book.cover_url)
        .bind(&book.amazon_link)
        .bind(book.price_amount)
        .bind(&book.price_currency)
        .bind(now)
        .bind(book.id)
        .execute(pool)
        .await
        .context("Failed to update book")?;

    Ok(Book {
        updated_at: now,
        ..book.clone()
    })
}

async fn list_books_mysql(pool: &MySqlPool, age_group: Option<AgeGroup>) -> Result<Vec<Book>> {
    let sql = list_sql(age_group.is_some());
    let mut query = sqlx::query(&sql);
    if let Some(group) = age_group {
        query = query.bind(group.to_string());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list books")?;

    rows.iter().map(row_to_book_mysql).collect()
}

fn row_to_book_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Book> {
    let age_group: String = row.get("age_group");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Ok(Book {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        age_group: AgeGroup::from_str(&age_group)?,
        cover_url: row.get("cover_url"),
        amazon_link: row.get("amazon_link"),
        price_amount: row.get("price_amount"),
        price_currency: row.get("price_currency"),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::BookInput;

    pub fn book_input(title: &str, age_group: AgeGroup) -> BookInput {
        BookInput {
            title: title.to_string(),
            description: Some(format!("About {}", title)),
            age_group,
            cover_url: None,
            amazon_link: None,
            price_amount: Some(10.0),
            price_currency: Some("USD".to_string()),
        }
    }

    pub async fn create_test_book(pool: &DynDatabasePool, title: &str, age_group: AgeGroup) -> Book {
        SqlxBookRepository::new(pool.clone())
            .create(&Book::new(book_input(title, age_group)))
            .await
            .expect("Failed to create book")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{book_input, create_test_book};
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxBookRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxBookRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get_book() {
        let (pool, repo) = setup_test_repo().await;
        let created = create_test_book(&pool, "Stardust", AgeGroup::Teens).await;
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Book not found");
        assert_eq!(found.title, "Stardust");
        assert_eq!(found.age_group, AgeGroup::Teens);
        assert_eq!(found.price_amount, Some(10.0));
        assert_eq!(found.price_currency, "USD");
    }

    #[tokio::test]
    async fn test_update_book() {
        let (pool, repo) = setup_test_repo().await;
        let mut book = create_test_book(&pool, "Draft", AgeGroup::Preteens).await;

        let mut input = book_input("Final", AgeGroup::YoungAdults);
        input.price_amount = None;
        book.apply(input);
        repo.update(&book).await.unwrap();

        let found = repo.get_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Final");
        assert_eq!(found.age_group, AgeGroup::YoungAdults);
        assert!(found.price_amount.is_none());
    }

    #[tokio::test]
    async fn test_list_by_age_group_newest_first() {
        let (pool, repo) = setup_test_repo().await;
        create_test_book(&pool, "Old teen", AgeGroup::Teens).await;
        create_test_book(&pool, "Kid", AgeGroup::Preteens).await;
        create_test_book(&pool, "New teen", AgeGroup::Teens).await;

        let teens = repo.list_by_age_group(AgeGroup::Teens).await.unwrap();
        let titles: Vec<&str> = teens.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["New teen", "Old teen"]);

        assert_eq!(repo.list().await.unwrap().len(), 3);
        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.count_by_age_group(AgeGroup::Preteens).await.unwrap(), 1);
        assert_eq!(repo.count_by_age_group(AgeGroup::YoungAdults).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_book() {
        let (pool, repo) = setup_test_repo().await;
        let book = create_test_book(&pool, "Gone", AgeGroup::Teens).await;

        repo.delete(book.id).await.unwrap();
        assert!(repo.get_by_id(book.id).await.unwrap().is_none());
    }
}
