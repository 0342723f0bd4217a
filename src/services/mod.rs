//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - Implementing business rules (age-group visibility, chapter ordering)
//! - Validating input before anything is written
//! - Turning repository failures into typed errors

pub mod activity;
pub mod book;
pub mod catalog;
pub mod chapter;
pub mod dashboard;
pub mod email;
pub mod event;
pub mod inquiry;
pub mod password;
pub mod storage;
pub mod user;

pub use activity::{ActivityService, ActivityServiceError};
pub use book::{BookService, BookServiceError};
pub use catalog::{CatalogService, CatalogServiceError, ChapterReading};
pub use chapter::{ChapterService, ChapterServiceError};
pub use dashboard::{AdminStats, DashboardService, ReaderStats};
pub use email::{EmailService, Mailer};
pub use event::{EventService, EventServiceError};
pub use inquiry::{InquiryService, InquiryServiceError};
pub use password::{hash_password, verify_password};
pub use storage::{Bucket, StorageError, StorageService, StoredFile, StoredObject};
pub use user::{
    ChangePasswordInput, LoginInput, RegisterInput, ResetConfirmInput, UserService, UserServiceError,
};
