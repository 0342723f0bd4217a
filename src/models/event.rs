//! Event model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A dated event shown to readers while visible
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    /// `HH:MM`
    pub event_time: Option<String>,
    pub video_url: Option<String>,
    pub learn_more_url: Option<String>,
    pub hero_image_url: Option<String>,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(input: EventInput) -> Self {
        let now = Utc::now();
        let mut event = Self {
            id: 0,
            title: String::new(),
            description: None,
            event_date: input.event_date,
            event_time: None,
            video_url: None,
            learn_more_url: None,
            hero_image_url: None,
            visible: true,
            created_at: now,
            updated_at: now,
        };
        event.apply(input);
        event
    }

    pub fn apply(&mut self, input: EventInput) {
        self.title = input.title.trim().to_string();
        self.description = super::non_blank(input.description);
        self.event_date = input.event_date;
        self.event_time = super::non_blank(input.event_time);
        self.video_url = super::non_blank(input.video_url);
        self.learn_more_url = super::non_blank(input.learn_more_url);
        self.hero_image_url = super::non_blank(input.hero_image_url);
        self.visible = input.visible;
        self.updated_at = Utc::now();
    }

    /// Whether the event is today or later
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.event_date >= today
    }
}

fn default_visible() -> bool {
    true
}

/// Input for creating or updating an event
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub learn_more_url: Option<String>,
    #[serde(default)]
    pub hero_image_url: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_defaults_to_true() {
        let input: EventInput =
            serde_json::from_str(r#"{"title":"Book fair","event_date":"2026-11-02"}"#).unwrap();
        assert!(input.visible);
        let event = Event::new(input);
        assert_eq!(event.event_date, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
    }

    #[test]
    fn test_is_upcoming_includes_today() {
        let input: EventInput =
            serde_json::from_str(r#"{"title":"Reading","event_date":"2026-10-16"}"#).unwrap();
        let event = Event::new(input);
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert!(event.is_upcoming(today));
        assert!(!event.is_upcoming(today.succ_opt().unwrap()));
    }
}
