//! Book administration
//!
//! Staff-facing CRUD over the catalog. Readers go through
//! [`CatalogService`](super::catalog::CatalogService) instead.

use crate::db::repositories::BookRepository;
use crate::models::{Book, BookInput};
use anyhow::Context;
use std::sync::Arc;

/// Error types for book operations
#[derive(Debug, thiserror::Error)]
pub enum BookServiceError {
    #[error("Book not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BookService {
    repo: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    /// Every book, newest first
    pub async fn list(&self) -> Result<Vec<Book>, BookServiceError> {
        Ok(self.repo.list().await.context("Failed to list books")?)
    }

    pub async fn get(&self, id: i64) -> Result<Book, BookServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get book")?
            .ok_or(BookServiceError::NotFound(id))
    }

    pub async fn create(&self, input: BookInput) -> Result<Book, BookServiceError> {
        validate(&input)?;
        let book = self
            .repo
            .create(&Book::new(input))
            .await
            .context("Failed to create book")?;
        tracing::info!("Created book {} for {}", book.id, book.age_group);
        Ok(book)
    }

    /// Full-record update
    pub async fn update(&self, id: i64, input: BookInput) -> Result<Book, BookServiceError> {
        validate(&input)?;
        let mut book = self.get(id).await?;
        book.apply(input);
        Ok(self.repo.update(&book).await.context("Failed to update book")?)
    }

    /// Delete a book with its chapters. Activities keep existing, detached.
    pub async fn delete(&self, id: i64) -> Result<(), BookServiceError> {
        self.get(id).await?;
        self.repo.delete(id).await.context("Failed to delete book")?;
        tracing::info!("Deleted book {}", id);
        Ok(())
    }
}

fn validate(input: &BookInput) -> Result<(), BookServiceError> {
    if input.title.trim().is_empty() {
        return Err(BookServiceError::ValidationError("Title is required".to_string()));
    }
    if let Some(amount) = input.price_amount {
        if !amount.is_finite() || amount < 0.0 {
            return Err(BookServiceError::ValidationError(
                "Price must be zero or more".to_string(),
            ));
        }
    }
    if let Some(currency) = input.price_currency.as_deref().map(str::trim) {
        if !currency.is_empty()
            && (currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(BookServiceError::ValidationError(format!(
                "Invalid currency code: {}",
                currency
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::book::test_support::book_input;
    use crate::db::repositories::chapter::test_support::append_test_chapter;
    use crate::db::repositories::{ChapterRepository, SqlxBookRepository, SqlxChapterRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{AgeGroup, DEFAULT_CURRENCY};

    async fn setup_test_service() -> (DynDatabasePool, BookService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = BookService::new(SqlxBookRepository::boxed(pool.clone()));
        (pool, service)
    }

    #[tokio::test]
    async fn test_create_normalizes_fields() {
        let (_pool, service) = setup_test_service().await;

        let mut input = book_input("  Starfall  ", AgeGroup::Teens);
        input.price_currency = Some("usd".to_string());
        input.description = Some("   ".to_string());
        let book = service.create(input).await.unwrap();

        assert_eq!(book.title, "Starfall");
        assert_eq!(book.price_currency, "USD");
        assert!(book.description.is_none());
        assert_eq!(service.get(book.id).await.unwrap().title, "Starfall");
    }

    #[tokio::test]
    async fn test_currency_defaults_to_rupees() {
        let (_pool, service) = setup_test_service().await;
        let mut input = book_input("Local", AgeGroup::Preteens);
        input.price_currency = None;
        let book = service.create(input).await.unwrap();
        assert_eq!(book.price_currency, DEFAULT_CURRENCY);
    }

    #[tokio::test]
    async fn test_validation() {
        let (_pool, service) = setup_test_service().await;

        let blank = book_input("   ", AgeGroup::Teens);
        assert!(matches!(service.create(blank).await, Err(BookServiceError::ValidationError(_))));

        let mut negative = book_input("Cheap", AgeGroup::Teens);
        negative.price_amount = Some(-1.0);
        assert!(matches!(service.create(negative).await, Err(BookServiceError::ValidationError(_))));

        let mut currency = book_input("Odd", AgeGroup::Teens);
        currency.price_currency = Some("RUPEE".to_string());
        assert!(matches!(service.create(currency).await, Err(BookServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_and_missing_book() {
        let (_pool, service) = setup_test_service().await;
        let book = service.create(book_input("Draft", AgeGroup::Teens)).await.unwrap();

        let updated = service
            .update(book.id, book_input("Final", AgeGroup::YoungAdults))
            .await
            .unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.age_group, AgeGroup::YoungAdults);

        let missing = service.update(999, book_input("Nope", AgeGroup::Teens)).await;
        assert!(matches!(missing, Err(BookServiceError::NotFound(999))));
    }

    #[tokio::test]
    async fn test_delete_removes_chapters() {
        let (pool, service) = setup_test_service().await;
        let book = service.create(book_input("Gone", AgeGroup::Teens)).await.unwrap();
        append_test_chapter(&pool, book.id, "One").await;

        service.delete(book.id).await.unwrap();

        let chapters = SqlxChapterRepository::new(pool.clone());
        assert!(chapters.list_by_book(book.id).await.unwrap().is_empty());
        assert!(matches!(service.delete(book.id).await, Err(BookServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_pool, service) = setup_test_service().await;
        let first = service.create(book_input("First", AgeGroup::Teens)).await.unwrap();
        let second = service.create(book_input("Second", AgeGroup::Preteens)).await.unwrap();

        let ids: Vec<i64> = service.list().await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
