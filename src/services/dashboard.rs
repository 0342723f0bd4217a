//! Dashboard statistics

use crate::db::repositories::{
    ActivityRepository, BookRepository, ChapterRepository, EventRepository, InquiryRepository,
    UserRepository,
};
use crate::models::{InquiryKind, Profile};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Staff overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub users: i64,
    pub books: i64,
    pub chapters: i64,
    pub activities: i64,
    pub events: i64,
    pub unanswered_feedback: i64,
    pub unanswered_questions: i64,
}

/// Reader overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    /// Books published for the reader's age group
    pub books: i64,
    pub my_activities: i64,
    pub upcoming_events: i64,
}

pub struct DashboardService {
    users: Arc<dyn UserRepository>,
    books: Arc<dyn BookRepository>,
    chapters: Arc<dyn ChapterRepository>,
    activities: Arc<dyn ActivityRepository>,
    events: Arc<dyn EventRepository>,
    inquiries: Arc<dyn InquiryRepository>,
}

impl DashboardService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        books: Arc<dyn BookRepository>,
        chapters: Arc<dyn ChapterRepository>,
        activities: Arc<dyn ActivityRepository>,
        events: Arc<dyn EventRepository>,
        inquiries: Arc<dyn InquiryRepository>,
    ) -> Self {
        Self {
            users,
            books,
            chapters,
            activities,
            events,
            inquiries,
        }
    }

    /// The seven counts are issued concurrently
    pub async fn admin_stats(&self) -> Result<AdminStats> {
        let (users, books, chapters, activities, events, unanswered_feedback, unanswered_questions) =
            tokio::try_join!(
                self.users.count(),
                self.books.count(),
                self.chapters.count(),
                self.activities.count(),
                self.events.count(),
                self.inquiries.count_unanswered(InquiryKind::Feedback),
                self.inquiries.count_unanswered(InquiryKind::Questions),
            )
            .context("Failed to load dashboard counts")?;

        Ok(AdminStats {
            users,
            books,
            chapters,
            activities,
            events,
            unanswered_feedback,
            unanswered_questions,
        })
    }

    pub async fn reader_stats(&self, profile: &Profile) -> Result<ReaderStats> {
        let today = Utc::now().date_naive();
        let (books, my_activities, upcoming_events) = tokio::try_join!(
            self.books.count_by_age_group(profile.age_group),
            self.activities.count_by_user(profile.user_id),
            self.events.count_upcoming(today),
        )
        .context("Failed to load reader counts")?;

        Ok(ReaderStats {
            books,
            my_activities,
            upcoming_events,
        })
    }
}
