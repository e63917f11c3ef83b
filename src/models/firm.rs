use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Slugs that would shadow a top-level route of the app.
pub const RESERVED_SLUGS: &[&str] = &[
    "admin", "api", "health", "login", "manage", "metrics", "not-found", "signup", "www",
];

const MAX_SLUG_LEN: usize = 63;

/// Lowercase ASCII alphanumerics separated by single hyphens, no leading or
/// trailing hyphen, at most 63 characters.
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SLUG_LEN
        && s.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    #[error("URL can only contain lowercase letters, numbers, and single hyphens, and cannot begin or end with a hyphen")]
    Invalid,
    #[error("This URL is reserved")]
    Reserved,
}

/// A validated firm slug, the public routing key of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if is_valid_slug(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(SlugError::Invalid)
        }
    }

    /// Like [`Slug::parse`], but also refuses slugs that collide with app routes.
    pub fn parse_for_signup(s: &str) -> Result<Self, SlugError> {
        let slug = Self::parse(s)?;
        if RESERVED_SLUGS.contains(&slug.as_str()) {
            return Err(SlugError::Reserved);
        }
        Ok(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Firm {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the admin firm directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FirmOverview {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub slug: String,
    pub lead_count: i64,
    pub signed_up_at: DateTime<Utc>,
}

impl FirmOverview {
    /// Case-insensitive match on name and email, plain substring on slug.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
            || self.slug.contains(term)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub firm_name: String,
    pub email: String,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}
