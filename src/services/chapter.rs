//! Chapter administration and reading order
//!
//! Keeps each book's `order_index` values at exactly `1..=N`:
//! - create appends at N+1
//! - delete closes the gap
//! - move swaps with the adjacent chapter under compare-and-swap guards
//! - repair renumbers densely after out-of-band edits

use crate::db::repositories::{BookRepository, ChapterRepository};
use crate::models::{
    dense_renumbering, is_dense_order, navigation, plan_move, Chapter, ChapterInput,
    ChapterNavigation, ChapterView, MoveDirection, MovePlan,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for chapter operations
#[derive(Debug, thiserror::Error)]
pub enum ChapterServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The stored order changed underneath the request
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ChapterService {
    repo: Arc<dyn ChapterRepository>,
    book_repo: Arc<dyn BookRepository>,
}

impl ChapterService {
    pub fn new(repo: Arc<dyn ChapterRepository>, book_repo: Arc<dyn BookRepository>) -> Self {
        Self { repo, book_repo }
    }

    /// Chapters of a book in reading order
    pub async fn list(&self, book_id: i64) -> Result<Vec<ChapterView>, ChapterServiceError> {
        self.ensure_book(book_id).await?;
        self.views(book_id).await
    }

    pub async fn get(&self, id: i64) -> Result<ChapterView, ChapterServiceError> {
        Ok(self.find(id).await?.into())
    }

    /// Append a chapter at the end of the book
    pub async fn create(
        &self,
        book_id: i64,
        input: ChapterInput,
    ) -> Result<ChapterView, ChapterServiceError> {
        validate(&input)?;
        self.ensure_book(book_id).await?;

        let chapter = self
            .repo
            .create(&Chapter::new(book_id, input))
            .await
            .context("Failed to create chapter")?;
        tracing::info!(
            "Appended chapter {} to book {} at position {}",
            chapter.id,
            book_id,
            chapter.order_index
        );
        Ok(chapter.into())
    }

    /// Full-record update; the chapter keeps its book and position
    pub async fn update(
        &self,
        id: i64,
        input: ChapterInput,
    ) -> Result<ChapterView, ChapterServiceError> {
        validate(&input)?;
        let mut chapter = self.find(id).await?;
        chapter.apply(input);
        let updated = self
            .repo
            .update(&chapter)
            .await
            .context("Failed to update chapter")?;
        Ok(updated.into())
    }

    /// Delete a chapter and shift the ones after it down by one
    pub async fn delete(&self, id: i64) -> Result<(), ChapterServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete chapter")?;
        if !deleted {
            return Err(ChapterServiceError::NotFound(format!("Chapter {}", id)));
        }
        tracing::info!("Deleted chapter {}", id);
        Ok(())
    }

    /// Move a chapter one step and return the book's authoritative order.
    ///
    /// At the first (up) or last (down) position nothing is written.
    pub async fn move_chapter(
        &self,
        id: i64,
        direction: MoveDirection,
    ) -> Result<Vec<ChapterView>, ChapterServiceError> {
        let chapter = self.find(id).await?;
        let chapters = self
            .repo
            .list_by_book(chapter.book_id)
            .await
            .context("Failed to list chapters")?;

        match plan_move(&chapters, id, direction) {
            MovePlan::NotFound => Err(ChapterServiceError::NotFound(format!("Chapter {}", id))),
            MovePlan::AtBoundary => {
                tracing::debug!("Chapter {} is already at the {} boundary", id, direction);
                Ok(chapters.into_iter().map(ChapterView::from).collect())
            }
            MovePlan::Inconsistent => {
                tracing::warn!("Book {} has a gap in its chapter order", chapter.book_id);
                Err(ChapterServiceError::Conflict(format!(
                    "Chapter order of book {} is not contiguous; repair it and retry",
                    chapter.book_id
                )))
            }
            MovePlan::Swap(swap) => {
                let applied = self
                    .repo
                    .swap_order(&swap)
                    .await
                    .context("Failed to swap chapters")?;
                if !applied {
                    return Err(ChapterServiceError::Conflict(
                        "Chapter order changed concurrently; reload and retry".to_string(),
                    ));
                }
                tracing::info!(
                    "Moved chapter {} {} to position {}",
                    id,
                    direction,
                    swap.neighbour_index
                );
                self.views(chapter.book_id).await
            }
        }
    }

    /// Renumber a book's chapters to `1..=N`, keeping their relative order.
    ///
    /// Nothing is written when the order is already dense.
    pub async fn repair_order(&self, book_id: i64) -> Result<Vec<ChapterView>, ChapterServiceError> {
        self.ensure_book(book_id).await?;
        let chapters = self
            .repo
            .list_by_book(book_id)
            .await
            .context("Failed to list chapters")?;

        if !is_dense_order(chapters.iter().map(|c| c.order_index)) {
            let positions = dense_renumbering(&chapters);
            self.repo
                .renumber(book_id, &positions)
                .await
                .context("Failed to renumber chapters")?;
            tracing::info!("Repaired order of {} chapter(s) in book {}", positions.len(), book_id);
        }
        self.views(book_id).await
    }

    /// Previous and next chapter for the reading view
    pub async fn navigation(&self, id: i64) -> Result<ChapterNavigation, ChapterServiceError> {
        let chapter = self.find(id).await?;
        let chapters = self
            .repo
            .list_by_book(chapter.book_id)
            .await
            .context("Failed to list chapters")?;
        navigation(&chapters, id).ok_or_else(|| ChapterServiceError::NotFound(format!("Chapter {}", id)))
    }

    async fn find(&self, id: i64) -> Result<Chapter, ChapterServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get chapter")?
            .ok_or_else(|| ChapterServiceError::NotFound(format!("Chapter {}", id)))
    }

    async fn ensure_book(&self, book_id: i64) -> Result<(), ChapterServiceError> {
        match self.book_repo.get_by_id(book_id).await.context("Failed to get book")? {
            Some(_) => Ok(()),
            None => Err(ChapterServiceError::NotFound(format!("Book {}", book_id))),
        }
    }

    async fn views(&self, book_id: i64) -> Result<Vec<ChapterView>, ChapterServiceError> {
        let chapters = self
            .repo
            .list_by_book(book_id)
            .await
            .context("Failed to list chapters")?;
        Ok(chapters.into_iter().map(ChapterView::from).collect())
    }
}

fn validate(input: &ChapterInput) -> Result<(), ChapterServiceError> {
    if input.title.trim().is_empty() {
        return Err(ChapterServiceError::ValidationError("Title is required".to_string()));
    }
    if input.chapter_number < 1 {
        return Err(ChapterServiceError::ValidationError(
            "Chapter number must be positive".to_string(),
        ));
    }
    Ok(())
}
