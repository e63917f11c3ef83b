//! Identity provider: credentials in, sessions out.
//!
//! The provider owns the current [`Session`] for one user agent and
//! broadcasts every change so the session resolver can follow it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    db::store::AccountStore,
    error::AppError,
    models::{account::SignupProfile, auth::Session},
    services::{auth::AuthService, provisioning::ProvisioningQueue},
};

const CHANGE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedUp,
    SignedOut,
    Refreshed,
}

#[derive(Debug, Clone)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Creates the account with `profile` attached and signs it in. The
    /// firm itself is provisioned asynchronously.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignupProfile,
    ) -> Result<Session, AppError>;

    async fn sign_out(&self);

    /// Reissues the current session with a fresh expiry. `Ok(None)` when
    /// nobody is signed in.
    async fn refresh(&self) -> Result<Option<Session>, AppError>;

    async fn current_session(&self) -> Option<Session>;

    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}

/// Identity provider backed by the account store, issuing HS256 tokens.
pub struct LocalIdentityProvider {
    accounts: Arc<dyn AccountStore>,
    provisioning: ProvisioningQueue,
    jwt_secret: String,
    ttl_seconds: u64,
    current: Mutex<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl LocalIdentityProvider {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        provisioning: ProvisioningQueue,
        jwt_secret: impl Into<String>,
        ttl_seconds: u64,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            accounts,
            provisioning,
            jwt_secret: jwt_secret.into(),
            ttl_seconds,
            current: Mutex::new(None),
            changes,
        }
    }

    /// Stores the session and notifies subscribers. Sending under the lock
    /// keeps notifications in the same order as the writes.
    fn replace(&self, event: SessionEvent, session: Option<Session>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = session.clone();
        // No subscribers is fine.
        let _ = self.changes.send(SessionChange { event, session });
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let account = AuthService::authenticate(self.accounts.as_ref(), email, password).await?;
        let session = AuthService::issue_session(&account, &self.jwt_secret, self.ttl_seconds)?;
        self.replace(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignupProfile,
    ) -> Result<Session, AppError> {
        let account = AuthService::register(
            self.accounts.as_ref(),
            &self.provisioning,
            email,
            password,
            profile,
        )
        .await?;
        let session = AuthService::issue_session(&account, &self.jwt_secret, self.ttl_seconds)?;
        self.replace(SessionEvent::SignedUp, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) {
        self.replace(SessionEvent::SignedOut, None);
    }

    async fn refresh(&self) -> Result<Option<Session>, AppError> {
        let Some(current) = self.current_session().await else {
            return Ok(None);
        };
        let Some(account) = self.accounts.find_by_id(current.account_id).await? else {
            self.replace(SessionEvent::SignedOut, None);
            return Ok(None);
        };
        let session = AuthService::issue_session(&account, &self.jwt_secret, self.ttl_seconds)?;
        self.replace(SessionEvent::Refreshed, Some(session.clone()));
        Ok(Some(session))
    }

    async fn current_session(&self) -> Option<Session> {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.clone().filter(|s| s.expires_at > chrono::Utc::now())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}
