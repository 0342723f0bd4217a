//! Feedback and questions
//!
//! Readers post to either inbox and can only read their own posts. Staff
//! see both inboxes and attach a single response to each post.

use crate::db::repositories::InquiryRepository;
use crate::models::{Inquiry, InquiryKind, InquiryWithNames};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InquiryServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct InquiryService {
    repo: Arc<dyn InquiryRepository>,
}

impl InquiryService {
    pub fn new(repo: Arc<dyn InquiryRepository>) -> Self {
        Self { repo }
    }

    /// Post feedback or a question. Blank text never reaches the database.
    pub async fn submit(
        &self,
        kind: InquiryKind,
        user_id: i64,
        text: &str,
    ) -> Result<Inquiry, InquiryServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InquiryServiceError::ValidationError(format!(
                "{} text cannot be empty",
                label(kind)
            )));
        }

        let inquiry = self
            .repo
            .create(kind, &Inquiry::new(user_id, text.to_string()))
            .await
            .with_context(|| format!("Failed to create {}", kind))?;
        tracing::info!("User {} posted {} {}", user_id, kind, inquiry.id);
        Ok(inquiry)
    }

    /// A reader's own posts, newest first
    pub async fn list_mine(
        &self,
        kind: InquiryKind,
        user_id: i64,
    ) -> Result<Vec<Inquiry>, InquiryServiceError> {
        Ok(self
            .repo
            .list_by_user(kind, user_id)
            .await
            .with_context(|| format!("Failed to list {}", kind))?)
    }

    /// Staff inbox, newest first
    pub async fn list_all(&self, kind: InquiryKind) -> Result<Vec<InquiryWithNames>, InquiryServiceError> {
        Ok(self
            .repo
            .list_all_with_names(kind)
            .await
            .with_context(|| format!("Failed to list {}", kind))?)
    }

    /// Set the staff response, replacing any earlier one
    pub async fn respond(
        &self,
        kind: InquiryKind,
        id: i64,
        responder_id: i64,
        response: &str,
    ) -> Result<Inquiry, InquiryServiceError> {
        let response = response.trim();
        if response.is_empty() {
            return Err(InquiryServiceError::ValidationError(
                "Response cannot be empty".to_string(),
            ));
        }

        let found = self
            .repo
            .respond(kind, id, response, responder_id, Utc::now())
            .await
            .with_context(|| format!("Failed to respond to {}", kind))?;
        if !found {
            return Err(InquiryServiceError::NotFound(format!("{} {}", label(kind), id)));
        }

        self.repo
            .get_by_id(kind, id)
            .await
            .with_context(|| format!("Failed to get {}", kind))?
            .ok_or_else(|| InquiryServiceError::NotFound(format!("{} {}", label(kind), id)))
    }
}

fn label(kind: InquiryKind) -> &'static str {
    match kind {
        InquiryKind::Feedback => "Feedback",
        InquiryKind::Questions => "Question",
    }
}
