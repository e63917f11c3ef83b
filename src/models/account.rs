use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity provider record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub pending_firm_name: Option<String>,
    pub pending_firm_slug: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// The signup profile still waiting to be provisioned, if any.
    pub fn pending_profile(&self) -> Option<SignupProfile> {
        match (&self.pending_firm_name, &self.pending_firm_slug) {
            (Some(name), Some(slug)) => Some(SignupProfile {
                firm_name: name.clone(),
                firm_slug: slug.clone(),
            }),
            _ => None,
        }
    }
}

/// Profile attributes attached to an account at signup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupProfile {
    pub firm_name: String,
    pub firm_slug: String,
}
