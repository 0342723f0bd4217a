//! User and profile models
//!
//! A `User` holds credentials and role; its one `Profile` holds the reader's
//! personal details and the age group that decides which books they see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Youngest age accepted at sign-up
pub const MIN_AGE: i32 = 5;
/// Oldest age accepted at sign-up
pub const MAX_AGE: i32 = 25;
/// Readers younger than this keep guardian details on their profile
pub const ADULT_AGE: i32 = 18;

/// Registered account credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user. The password must already be hashed.
    pub fn new(email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Staff - manages content and answers feedback
    Admin,
    /// Reader
    #[default]
    User,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Reading cohort. Books are published for exactly one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    /// Ages 5 to 12
    Preteens,
    /// Ages 13 to 17
    Teens,
    /// Ages 18 to 25
    YoungAdults,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Preteens, AgeGroup::Teens, AgeGroup::YoungAdults];

    /// Derive the cohort from an age, `None` outside the accepted range.
    pub fn from_age(age: i32) -> Option<Self> {
        match age {
            MIN_AGE..=12 => Some(AgeGroup::Preteens),
            13..=17 => Some(AgeGroup::Teens),
            18..=MAX_AGE => Some(AgeGroup::YoungAdults),
            _ => None,
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeGroup::Preteens => write!(f, "preteens"),
            AgeGroup::Teens => write!(f, "teens"),
            AgeGroup::YoungAdults => write!(f, "young_adults"),
        }
    }
}

impl FromStr for AgeGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preteens" => Ok(AgeGroup::Preteens),
            "teens" => Ok(AgeGroup::Teens),
            "young_adults" => Ok(AgeGroup::YoungAdults),
            _ => Err(anyhow::anyhow!("Invalid age group: {}", s)),
        }
    }
}

/// Reader profile, one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: i64,
    pub full_name: String,
    pub age: i32,
    pub age_group: AgeGroup,
    pub gender: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_contact: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub consent_given: bool,
    pub consent_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields, shared by sign-up and profile settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub full_name: String,
    pub age: i32,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_contact: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
}

impl ProfileInput {
    /// Build a profile for `user_id` from this input.
    ///
    /// Text fields are trimmed, blanks become `None`, and guardian details
    /// are dropped for adults. Returns `None` when the age is out of range.
    pub fn into_profile(self, user_id: i64, consent_given: bool) -> Option<Profile> {
        let age_group = AgeGroup::from_age(self.age)?;
        let is_minor = self.age < ADULT_AGE;
        let now = Utc::now();
        Some(Profile {
            user_id,
            full_name: self.full_name.trim().to_string(),
            age: self.age,
            age_group,
            gender: non_blank(self.gender),
            guardian_name: if is_minor { non_blank(self.guardian_name) } else { None },
            guardian_contact: if is_minor { non_blank(self.guardian_contact) } else { None },
            city: non_blank(self.city),
            country: non_blank(self.country),
            pincode: non_blank(self.pincode),
            consent_given,
            consent_timestamp: consent_given.then_some(now),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Trim an optional string, mapping empty values to `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A user together with their profile.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub user: User,
    pub profile: Profile,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}
