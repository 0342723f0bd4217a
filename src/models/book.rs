//! Book model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AgeGroup;

/// Currency assumed when a book is saved without one
pub const DEFAULT_CURRENCY: &str = "INR";

/// A book published for one age group. Owns its chapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub age_group: AgeGroup,
    pub cover_url: Option<String>,
    /// External purchase link
    pub amazon_link: Option<String>,
    pub price_amount: Option<f64>,
    /// ISO currency code
    pub price_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(input: BookInput) -> Self {
        let now = Utc::now();
        let mut book = Self {
            id: 0,
            title: String::new(),
            description: None,
            age_group: input.age_group,
            cover_url: None,
            amazon_link: None,
            price_amount: None,
            price_currency: DEFAULT_CURRENCY.to_string(),
            created_at: now,
            updated_at: now,
        };
        book.apply(input);
        book
    }

    /// Overwrite every editable field with `input`
    pub fn apply(&mut self, input: BookInput) {
        self.title = input.title.trim().to_string();
        self.description = super::non_blank(input.description);
        self.age_group = input.age_group;
        self.cover_url = super::non_blank(input.cover_url);
        self.amazon_link = super::non_blank(input.amazon_link);
        self.price_amount = input.price_amount;
        self.price_currency = super::non_blank(input.price_currency)
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        self.updated_at = Utc::now();
    }

    /// Case-insensitive substring match on title or description.
    /// A blank term matches everything.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&term)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&term))
                .unwrap_or(false)
    }

    /// Price shown to a reader from `country`.
    ///
    /// Only a price in the reader's locale currency is shown; any other
    /// currency, or a missing amount, hides the price.
    pub fn price_label(&self, country: Option<&str>) -> Option<String> {
        let amount = self.price_amount?;
        let currency = locale_currency(country);
        if !self.price_currency.eq_ignore_ascii_case(currency) {
            return None;
        }
        Some(format!("{} {}", currency, format_amount(amount)))
    }
}

/// Locale currency for a reader: rupees in India, dollars elsewhere
pub fn locale_currency(country: Option<&str>) -> &'static str {
    match country {
        Some(c) if c.trim().eq_ignore_ascii_case("india") => "INR",
        _ => "USD",
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

/// Input for creating or fully updating a book
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub age_group: AgeGroup,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub amazon_link: Option<String>,
    #[serde(default)]
    pub price_amount: Option<f64>,
    #[serde(default)]
    pub price_currency: Option<String>,
}

/// A book as shown to a reader, with the price already localized
#[derive(Debug, Clone, Serialize)]
pub struct BookListing {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub age_group: AgeGroup,
    pub cover_url: Option<String>,
    pub amazon_link: Option<String>,
    /// `None` when the book has no price in the reader's currency
    pub price: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookListing {
    pub fn for_reader(book: &Book, country: Option<&str>) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            description: book.description.clone(),
            age_group: book.age_group,
            cover_url: book.cover_url.clone(),
            amazon_link: book.amazon_link.clone(),
            price: book.price_label(country),
            created_at: book.created_at,
        }
    }
}
