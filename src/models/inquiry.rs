//! Feedback and question model
//!
//! Both kinds share one shape and live in separate tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which inbox an inquiry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryKind {
    Feedback,
    Questions,
}

impl InquiryKind {
    pub const ALL: [InquiryKind; 2] = [InquiryKind::Feedback, InquiryKind::Questions];

    /// Backing table
    pub fn table(&self) -> &'static str {
        match self {
            InquiryKind::Feedback => "feedback",
            InquiryKind::Questions => "questions",
        }
    }
}

impl std::fmt::Display for InquiryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

impl std::str::FromStr for InquiryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feedback" => Ok(Self::Feedback),
            "questions" | "question" => Ok(Self::Questions),
            _ => Err(format!("Invalid inquiry kind: {}", s)),
        }
    }
}

/// A reader's feedback or question, with at most one staff reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub admin_response: Option<String>,
    pub responded_by: Option<i64>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inquiry {
    pub fn new(user_id: i64, text: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            text,
            admin_response: None,
            responded_by: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.admin_response.is_some()
    }
}

/// Inquiry with author and responder names for the staff inbox
#[derive(Debug, Clone, Serialize)]
pub struct InquiryWithNames {
    #[serde(flatten)]
    pub inquiry: Inquiry,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub responder_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tables() {
        assert_eq!(InquiryKind::Feedback.table(), "feedback");
        assert_eq!(InquiryKind::Questions.table(), "questions");
        assert_eq!("question".parse::<InquiryKind>().unwrap(), InquiryKind::Questions);
        assert!("complaints".parse::<InquiryKind>().is_err());
    }

    #[test]
    fn test_new_inquiry_is_unanswered() {
        let inquiry = Inquiry::new(3, "Loved chapter two".to_string());
        assert!(!inquiry.is_answered());
    }
}
