//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles operations for a specific entity.

pub mod activity;
pub mod book;
pub mod chapter;
pub mod event;
pub mod inquiry;
pub mod session;
pub mod user;

pub use activity::{ActivityRepository, SqlxActivityRepository};
pub use book::{BookRepository, SqlxBookRepository};
pub use chapter::{ChapterRepository, SqlxChapterRepository};
pub use event::{EventRepository, SqlxEventRepository};
pub use inquiry::{InquiryRepository, SqlxInquiryRepository};
pub use session::{
    PasswordResetRepository, SessionRepository, SqlxPasswordResetRepository, SqlxSessionRepository,
};
pub use user::{SqlxUserRepository, UserRepository};

/// Whether `err` was caused by a unique constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}
