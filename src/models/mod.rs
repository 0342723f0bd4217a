//! Data models
//!
//! This module contains all data structures used throughout Meteor.
//! Models represent:
//! - Database entities (User, Profile, Session, Book, Chapter, Activity, Event, Inquiry)
//! - API request/response types
//! - Pure domain rules (age groups, locale pricing, chapter ordering)

mod activity;
mod book;
pub mod chapter;
mod event;
mod inquiry;
mod session;
mod user;

pub use activity::{Activity, ActivityStatus, ActivityWithMeta, PublishActivityInput, SubmitActivityInput};
pub use book::{locale_currency, Book, BookInput, BookListing, DEFAULT_CURRENCY};
pub use chapter::{
    dense_renumbering, is_dense_order, navigation, plan_move, Chapter, ChapterInput,
    ChapterNavigation, ChapterRef, ChapterView, MoveDirection, MovePlan, OrderSwap, PdfSource,
};
pub use event::{Event, EventInput};
pub use inquiry::{Inquiry, InquiryKind, InquiryWithNames};
pub use session::{PasswordReset, Session};
pub use user::{
    non_blank, Account, AgeGroup, Profile, ProfileInput, User, UserRole, ADULT_AGE, MAX_AGE, MIN_AGE,
};
