//! Data-store interfaces used by the services.
//!
//! Postgres backs them in production ([`super::postgres::PgStore`]); the
//! traits keep the guard, poller and resolver testable without a database.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    account::{Account, SignupProfile},
    firm::{Firm, FirmOverview},
    lead::{Lead, NewLead},
    principal::{MembershipRecord, Role},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated; carries the constraint name.
    #[error("duplicate value for {0}")]
    Conflict(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let conflict = e
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.constraint().unwrap_or("unique key").to_string());
        match conflict {
            Some(constraint) => StoreError::Conflict(constraint),
            None => StoreError::Other(e.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait FirmStore: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Firm>>;

    async fn find_by_owner_email(&self, email: &str) -> StoreResult<Option<Firm>>;

    /// True when a firm holds the slug or a signup is still waiting to claim it.
    async fn slug_taken(&self, slug: &str) -> StoreResult<bool>;

    async fn list_overview(&self) -> StoreResult<Vec<FirmOverview>>;

    async fn update_profile(&self, id: Uuid, name: &str, email: &str) -> StoreResult<Firm>;

    /// Creates the firm and the owner's membership and clears the account's
    /// pending profile, atomically.
    async fn provision_for_account(
        &self,
        account_id: Uuid,
        owner_email: &str,
        profile: &SignupProfile,
    ) -> StoreResult<Firm>;

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_for_account(&self, account_id: Uuid) -> StoreResult<Option<MembershipRecord>>;

    /// Inserts the membership, or changes the role of an existing one.
    async fn set_role(&self, account_id: Uuid, role: Role) -> StoreResult<()>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert(&self, firm_id: Uuid, lead: &NewLead) -> StoreResult<Lead>;

    /// Newest first.
    async fn list_for_firm(&self, firm_id: Uuid) -> StoreResult<Vec<Lead>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    async fn insert(
        &self,
        email: &str,
        password_hash: &str,
        profile: Option<&SignupProfile>,
    ) -> StoreResult<Account>;

    async fn update_credentials(
        &self,
        id: Uuid,
        email: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<()>;

    /// Accounts whose signup profile has not been provisioned yet.
    async fn list_pending(&self) -> StoreResult<Vec<Account>>;
}

/// Handles to every store, shared by the HTTP state and the portal.
#[derive(Clone)]
pub struct Stores {
    pub firms: Arc<dyn FirmStore>,
    pub memberships: Arc<dyn MembershipStore>,
    pub leads: Arc<dyn LeadStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Stores {
    /// All four interfaces served by one backing store.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: FirmStore + MembershipStore + LeadStore + AccountStore + 'static,
    {
        Self {
            firms: backend.clone(),
            memberships: backend.clone(),
            leads: backend.clone(),
            accounts: backend,
        }
    }
}
