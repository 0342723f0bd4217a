//! Activity model
//!
//! Activities are either reader submissions (owned by a user, optionally
//! carrying an uploaded file) or published worksheets authored by staff,
//! which have a PDF and no owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state of an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Submitted,
    Reviewed,
    Approved,
    Rejected,
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Reviewed => write!(f, "reviewed"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(Self::Submitted),
            "reviewed" => Ok(Self::Reviewed),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid activity status: {}", s)),
        }
    }
}

/// Activity entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    /// Submitter; `None` for published activities
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub chapter_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    /// Uploaded file of a submission
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    /// Worksheet of a published activity
    pub pdf_url: Option<String>,
    pub cover_url: Option<String>,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// A reader's submission
    pub fn submission(user_id: i64, input: SubmitActivityInput) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id: Some(user_id),
            book_id: input.book_id,
            chapter_id: input.chapter_id,
            title: input.title.trim().to_string(),
            description: super::non_blank(input.description),
            file_url: super::non_blank(input.file_url),
            file_name: super::non_blank(input.file_name),
            pdf_url: None,
            cover_url: None,
            status: ActivityStatus::Submitted,
            created_at: now,
            updated_at: now,
        }
    }

    /// A staff-published worksheet
    pub fn published(input: PublishActivityInput) -> Self {
        let now = Utc::now();
        let mut activity = Self {
            id: 0,
            user_id: None,
            book_id: None,
            chapter_id: None,
            title: String::new(),
            description: None,
            file_url: None,
            file_name: None,
            pdf_url: None,
            cover_url: None,
            status: ActivityStatus::Approved,
            created_at: now,
            updated_at: now,
        };
        activity.apply_published(input);
        activity
    }

    /// Overwrite the editable fields of a published activity
    pub fn apply_published(&mut self, input: PublishActivityInput) {
        self.title = input.title.trim().to_string();
        self.description = super::non_blank(input.description);
        self.book_id = input.book_id;
        self.chapter_id = input.chapter_id;
        self.pdf_url = super::non_blank(input.pdf_url);
        self.cover_url = super::non_blank(input.cover_url);
        self.updated_at = Utc::now();
    }

    pub fn is_published(&self) -> bool {
        self.user_id.is_none() && self.pdf_url.is_some()
    }
}

/// Input for a reader submission
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitActivityInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub book_id: Option<i64>,
    #[serde(default)]
    pub chapter_id: Option<i64>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Input for publishing or editing a worksheet
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishActivityInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub book_id: Option<i64>,
    #[serde(default)]
    pub chapter_id: Option<i64>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

/// Activity with submitter and book context for the staff list
#[derive(Debug, Clone, Serialize)]
pub struct ActivityWithMeta {
    #[serde(flatten)]
    pub activity: Activity,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub book_title: Option<String>,
    pub chapter_title: Option<String>,
    pub chapter_number: Option<i32>,
}
