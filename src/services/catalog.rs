//! Reader catalog
//!
//! A reader only ever sees books published for their own age group. Prices
//! are localized per reader; see [`Book::price_label`].

use crate::db::repositories::{BookRepository, ChapterRepository};
use crate::models::{navigation, Book, BookListing, ChapterNavigation, ChapterView, Profile};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CatalogServiceError {
    /// Missing, or published for another age group
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A chapter opened for reading
#[derive(Debug, Clone, Serialize)]
pub struct ChapterReading {
    pub book: BookListing,
    pub chapter: ChapterView,
    pub navigation: ChapterNavigation,
}

/// Books visible to `profile`, optionally narrowed by `search`, newest first.
pub fn filter_books(books: &[Book], profile: &Profile, search: Option<&str>) -> Vec<BookListing> {
    let country = profile.country.as_deref();
    let mut visible: Vec<&Book> = books
        .iter()
        .filter(|b| b.age_group == profile.age_group)
        .filter(|b| search.map_or(true, |term| b.matches_search(term)))
        .collect();
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    visible
        .into_iter()
        .map(|b| BookListing::for_reader(b, country))
        .collect()
}

pub struct CatalogService {
    book_repo: Arc<dyn BookRepository>,
    chapter_repo: Arc<dyn ChapterRepository>,
}

impl CatalogService {
    pub fn new(book_repo: Arc<dyn BookRepository>, chapter_repo: Arc<dyn ChapterRepository>) -> Self {
        Self {
            book_repo,
            chapter_repo,
        }
    }

    pub async fn visible_books(
        &self,
        profile: &Profile,
        search: Option<&str>,
    ) -> Result<Vec<BookListing>, CatalogServiceError> {
        let books = self
            .book_repo
            .list_by_age_group(profile.age_group)
            .await
            .context("Failed to list books")?;
        Ok(filter_books(&books, profile, search))
    }

    pub async fn open_book(
        &self,
        profile: &Profile,
        book_id: i64,
    ) -> Result<BookListing, CatalogServiceError> {
        let book = self.readable_book(profile, book_id).await?;
        Ok(BookListing::for_reader(&book, profile.country.as_deref()))
    }

    /// Chapters of a readable book in reading order
    pub async fn book_chapters(
        &self,
        profile: &Profile,
        book_id: i64,
    ) -> Result<Vec<ChapterView>, CatalogServiceError> {
        self.readable_book(profile, book_id).await?;
        let chapters = self
            .chapter_repo
            .list_by_book(book_id)
            .await
            .context("Failed to list chapters")?;
        Ok(chapters.into_iter().map(ChapterView::from).collect())
    }

    pub async fn read_chapter(
        &self,
        profile: &Profile,
        chapter_id: i64,
    ) -> Result<ChapterReading, CatalogServiceError> {
        let not_found = || CatalogServiceError::NotFound(format!("Chapter {}", chapter_id));

        let chapter = self
            .chapter_repo
            .get_by_id(chapter_id)
            .await
            .context("Failed to get chapter")?
            .ok_or_else(not_found)?;
        let book = self
            .readable_book(profile, chapter.book_id)
            .await
            .map_err(|e| match e {
                CatalogServiceError::NotFound(_) => not_found(),
                other => other,
            })?;

        let siblings = self
            .chapter_repo
            .list_by_book(book.id)
            .await
            .context("Failed to list chapters")?;
        let navigation = navigation(&siblings, chapter.id).ok_or_else(not_found)?;

        Ok(ChapterReading {
            book: BookListing::for_reader(&book, profile.country.as_deref()),
            chapter: chapter.into(),
            navigation,
        })
    }

    async fn readable_book(&self, profile: &Profile, book_id: i64) -> Result<Book, CatalogServiceError> {
        match self.book_repo.get_by_id(book_id).await.context("Failed to get book")? {
            Some(book) if book.age_group == profile.age_group => Ok(book),
            Some(_) => {
                tracing::debug!(
                    "Book {} hidden from user {} ({})",
                    book_id,
                    profile.user_id,
                    profile.age_group
                );
                Err(CatalogServiceError::NotFound(format!("Book {}", book_id)))
            }
            None => Err(CatalogServiceError::NotFound(format!("Book {}", book_id))),
        }
    }
}
