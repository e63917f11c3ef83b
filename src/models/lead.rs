use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Lead {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub submitted_at: DateTime<Utc>,
}

impl Lead {
    /// Case-insensitive match on name and email, plain substring on phone.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.full_name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
            || self.phone.contains(term)
    }
}

/// Public intake form payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLead {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}
