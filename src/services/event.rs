//! Event service

use crate::db::repositories::EventRepository;
use crate::models::{Event, EventInput};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EventServiceError {
    #[error("Event not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct EventService {
    repo: Arc<dyn EventRepository>,
}

impl EventService {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// Every event, latest date first
    pub async fn list_all(&self) -> Result<Vec<Event>, EventServiceError> {
        Ok(self.repo.list_all().await.context("Failed to list events")?)
    }

    /// Visible events in date order, for readers
    pub async fn list_visible(&self) -> Result<Vec<Event>, EventServiceError> {
        Ok(self
            .repo
            .list_visible()
            .await
            .context("Failed to list visible events")?)
    }

    pub async fn get(&self, id: i64) -> Result<Event, EventServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get event")?
            .ok_or(EventServiceError::NotFound(id))
    }

    pub async fn create(&self, input: EventInput) -> Result<Event, EventServiceError> {
        validate(&input)?;
        let event = self
            .repo
            .create(&Event::new(input))
            .await
            .context("Failed to create event")?;
        tracing::info!("Created event {} on {}", event.id, event.event_date);
        Ok(event)
    }

    pub async fn update(&self, id: i64, input: EventInput) -> Result<Event, EventServiceError> {
        validate(&input)?;
        let mut event = self.get(id).await?;
        event.apply(input);
        Ok(self.repo.update(&event).await.context("Failed to update event")?)
    }

    pub async fn set_visibility(&self, id: i64, visible: bool) -> Result<Event, EventServiceError> {
        let updated = self
            .repo
            .set_visibility(id, visible)
            .await
            .context("Failed to set event visibility")?;
        if !updated {
            return Err(EventServiceError::NotFound(id));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), EventServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete event")? {
            return Err(EventServiceError::NotFound(id));
        }
        Ok(())
    }
}

fn validate(input: &EventInput) -> Result<(), EventServiceError> {
    if input.title.trim().is_empty() {
        return Err(EventServiceError::ValidationError("Title is required".to_string()));
    }
    if let Some(time) = input.event_time.as_deref().map(str::trim) {
        if !time.is_empty() && !is_clock_time(time) {
            return Err(EventServiceError::ValidationError(format!(
                "Event time must be HH:MM, got '{}'",
                time
            )));
        }
    }
    Ok(())
}

/// `HH:MM` on a 24 hour clock
fn is_clock_time(value: &str) -> bool {
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());
    two_digits(hours)
        && two_digits(minutes)
        && hours.parse::<u8>().map_or(false, |h| h < 24)
        && minutes.parse::<u8>().map_or(false, |m| m < 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxEventRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::NaiveDate;

    async fn setup_test_service() -> EventService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        EventService::new(SqlxEventRepository::boxed(pool))
    }

    fn input(title: &str, date: &str, time: Option<&str>) -> EventInput {
        EventInput {
            title: title.to_string(),
            description: None,
            event_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            event_time: time.map(str::to_string),
            video_url: None,
            learn_more_url: None,
            hero_image_url: None,
            visible: true,
        }
    }

    #[test]
    fn test_clock_time() {
        assert!(is_clock_time("00:00"));
        assert!(is_clock_time("23:59"));
        assert!(!is_clock_time("24:00"));
        assert!(!is_clock_time("9:30"));
        assert!(!is_clock_time("09:60"));
        assert!(!is_clock_time("0930"));
    }

    #[tokio::test]
    async fn test_create_validates_time() {
        let service = setup_test_service().await;

        let ok = service.create(input("Fair", "2026-11-01", Some("17:30"))).await.unwrap();
        assert_eq!(ok.event_time.as_deref(), Some("17:30"));

        let bad = service.create(input("Fair", "2026-11-01", Some("5pm"))).await;
        assert!(matches!(bad, Err(EventServiceError::ValidationError(_))));

        let blank = service.create(input(" ", "2026-11-01", None)).await;
        assert!(matches!(blank, Err(EventServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_hidden_events_are_not_listed_for_readers() {
        let service = setup_test_service().await;
        let later = service.create(input("Later", "2026-12-01", None)).await.unwrap();
        let sooner = service.create(input("Sooner", "2026-11-01", None)).await.unwrap();

        let visible: Vec<i64> = service.list_visible().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(visible, vec![sooner.id, later.id]);

        let hidden = service.set_visibility(sooner.id, false).await.unwrap();
        assert!(!hidden.visible);
        let visible: Vec<i64> = service.list_visible().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(visible, vec![later.id]);

        let all: Vec<i64> = service.list_all().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(all, vec![later.id, sooner.id]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = setup_test_service().await;
        let event = service.create(input("Draft", "2026-11-01", None)).await.unwrap();

        let updated = service
            .update(event.id, input("Final", "2026-11-05", Some("10:00")))
            .await
            .unwrap();
        assert_eq!(updated.title, "Final");

        service.delete(event.id).await.unwrap();
        assert!(matches!(service.get(event.id).await, Err(EventServiceError::NotFound(_))));
        assert!(matches!(
            service.set_visibility(event.id, true).await,
            Err(EventServiceError::NotFound(_))
        ));
    }
}
