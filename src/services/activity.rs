//! Activity service
//!
//! Readers submit creative work against a book or chapter; staff review the
//! submissions and publish worksheets that every signed-in reader can open.

use crate::db::repositories::{ActivityRepository, BookRepository, ChapterRepository};
use crate::models::{
    Activity, ActivityStatus, ActivityWithMeta, PublishActivityInput, SubmitActivityInput,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for activity operations
#[derive(Debug, thiserror::Error)]
pub enum ActivityServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ActivityService {
    repo: Arc<dyn ActivityRepository>,
    book_repo: Arc<dyn BookRepository>,
    chapter_repo: Arc<dyn ChapterRepository>,
}

impl ActivityService {
    pub fn new(
        repo: Arc<dyn ActivityRepository>,
        book_repo: Arc<dyn BookRepository>,
        chapter_repo: Arc<dyn ChapterRepository>,
    ) -> Self {
        Self {
            repo,
            book_repo,
            chapter_repo,
        }
    }

    /// Store a reader's submission with status `submitted`
    pub async fn submit(
        &self,
        user_id: i64,
        mut input: SubmitActivityInput,
    ) -> Result<Activity, ActivityServiceError> {
        require_title(&input.title)?;
        input.book_id = self.resolve_book(input.book_id, input.chapter_id).await?;

        let activity = self
            .repo
            .create(&Activity::submission(user_id, input))
            .await
            .context("Failed to create activity")?;
        tracing::info!("User {} submitted activity {}", user_id, activity.id);
        Ok(activity)
    }

    /// A reader's own submissions, newest first
    pub async fn list_mine(&self, user_id: i64) -> Result<Vec<Activity>, ActivityServiceError> {
        Ok(self
            .repo
            .list_by_user(user_id)
            .await
            .context("Failed to list activities")?)
    }

    /// Published worksheets, newest first
    pub async fn list_published(&self) -> Result<Vec<Activity>, ActivityServiceError> {
        Ok(self
            .repo
            .list_published()
            .await
            .context("Failed to list published activities")?)
    }

    /// Every activity with submitter and book context
    pub async fn list_all(&self) -> Result<Vec<ActivityWithMeta>, ActivityServiceError> {
        Ok(self
            .repo
            .list_all_with_meta()
            .await
            .context("Failed to list activities")?)
    }

    pub async fn get(&self, id: i64) -> Result<Activity, ActivityServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get activity")?
            .ok_or_else(|| ActivityServiceError::NotFound(format!("Activity {}", id)))
    }

    /// Publish a staff worksheet. A PDF is required.
    pub async fn publish(
        &self,
        mut input: PublishActivityInput,
    ) -> Result<Activity, ActivityServiceError> {
        validate_published(&input)?;
        input.book_id = self.resolve_book(input.book_id, input.chapter_id).await?;

        let activity = self
            .repo
            .create(&Activity::published(input))
            .await
            .context("Failed to publish activity")?;
        tracing::info!("Published activity {}", activity.id);
        Ok(activity)
    }

    /// Full-record update of a published worksheet
    pub async fn update_published(
        &self,
        id: i64,
        mut input: PublishActivityInput,
    ) -> Result<Activity, ActivityServiceError> {
        validate_published(&input)?;
        let mut activity = self.get(id).await?;
        if activity.user_id.is_some() {
            return Err(ActivityServiceError::ValidationError(
                "Reader submissions cannot be edited".to_string(),
            ));
        }
        input.book_id = self.resolve_book(input.book_id, input.chapter_id).await?;

        activity.apply_published(input);
        Ok(self
            .repo
            .update(&activity)
            .await
            .context("Failed to update activity")?)
    }

    /// Review a reader submission. Published worksheets stay approved.
    pub async fn set_status(
        &self,
        id: i64,
        status: ActivityStatus,
    ) -> Result<Activity, ActivityServiceError> {
        if self.get(id).await?.user_id.is_none() {
            return Err(ActivityServiceError::ValidationError(
                "Published activities are always approved".to_string(),
            ));
        }
        let updated = self
            .repo
            .set_status(id, status)
            .await
            .context("Failed to set activity status")?;
        if !updated {
            return Err(ActivityServiceError::NotFound(format!("Activity {}", id)));
        }
        tracing::info!("Activity {} marked {}", id, status);
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ActivityServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete activity")?;
        if !deleted {
            return Err(ActivityServiceError::NotFound(format!("Activity {}", id)));
        }
        Ok(())
    }

    /// Check the book/chapter pair and return the effective book id.
    ///
    /// A chapter alone implies its book; a chapter of another book is rejected.
    async fn resolve_book(
        &self,
        book_id: Option<i64>,
        chapter_id: Option<i64>,
    ) -> Result<Option<i64>, ActivityServiceError> {
        if let Some(chapter_id) = chapter_id {
            let chapter = self
                .chapter_repo
                .get_by_id(chapter_id)
                .await
                .context("Failed to get chapter")?
                .ok_or_else(|| {
                    ActivityServiceError::ValidationError(format!("Chapter {} does not exist", chapter_id))
                })?;
            return match book_id {
                Some(book_id) if book_id != chapter.book_id => Err(ActivityServiceError::ValidationError(
                    format!("Chapter {} does not belong to book {}", chapter_id, book_id),
                )),
                _ => Ok(Some(chapter.book_id)),
            };
        }

        if let Some(book_id) = book_id {
            if self
                .book_repo
                .get_by_id(book_id)
                .await
                .context("Failed to get book")?
                .is_none()
            {
                return Err(ActivityServiceError::ValidationError(format!(
                    "Book {} does not exist",
                    book_id
                )));
            }
        }
        Ok(book_id)
    }
}

fn require_title(title: &str) -> Result<(), ActivityServiceError> {
    if title.trim().is_empty() {
        return Err(ActivityServiceError::ValidationError("Title is required".to_string()));
    }
    Ok(())
}

fn validate_published(input: &PublishActivityInput) -> Result<(), ActivityServiceError> {
    require_title(&input.title)?;
    if input.pdf_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return Err(ActivityServiceError::ValidationError(
            "A PDF is required to publish an activity".to_string(),
        ));
    }
    Ok(())
}
