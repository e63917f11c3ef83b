//! In-memory stores and fixtures for unit and router tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    db::store::{
        AccountStore, FirmStore, LeadStore, MembershipStore, StoreError, StoreResult, Stores,
    },
    models::{
        account::{Account, SignupProfile},
        firm::{Firm, FirmOverview},
        lead::{Lead, NewLead},
        principal::{FirmRef, MembershipRecord, Role},
    },
    services::{poller::BackoffPolicy, provisioning::ProvisioningQueue},
    AppState,
};

pub const TEST_JWT_SECRET: &str = "test-secret";

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    firms: Vec<Firm>,
    memberships: Vec<(Uuid, Role, Option<Uuid>)>,
    leads: Vec<Lead>,
}

/// Implements every store trait over plain vectors, with the same unique
/// keys as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_firm(&self, name: &str, slug: &str, email: &str) -> Firm {
        let now = Utc::now();
        let firm = Firm {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        };
        self.tables().firms.push(firm.clone());
        firm
    }

    pub fn add_membership(&self, account_id: Uuid, role: Role, firm_id: Option<Uuid>) {
        let mut tables = self.tables();
        tables.memberships.retain(|(id, _, _)| *id != account_id);
        tables.memberships.push((account_id, role, firm_id));
    }
}

#[async_trait]
impl FirmStore for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Firm>> {
        Ok(self.tables().firms.iter().find(|f| f.slug == slug).cloned())
    }

    async fn find_by_owner_email(&self, email: &str) -> StoreResult<Option<Firm>> {
        Ok(self.tables().firms.iter().find(|f| f.email == email).cloned())
    }

    async fn slug_taken(&self, slug: &str) -> StoreResult<bool> {
        let tables = self.tables();
        Ok(tables.firms.iter().any(|f| f.slug == slug)
            || tables
                .accounts
                .iter()
                .any(|a| a.pending_firm_slug.as_deref() == Some(slug)))
    }

    async fn list_overview(&self) -> StoreResult<Vec<FirmOverview>> {
        let tables = self.tables();
        Ok(tables
            .firms
            .iter()
            .rev()
            .map(|f| FirmOverview {
                id: f.id,
                name: f.name.clone(),
                email: f.email.clone(),
                slug: f.slug.clone(),
                lead_count: tables.leads.iter().filter(|l| l.firm_id == f.id).count() as i64,
                signed_up_at: f.created_at,
            })
            .collect())
    }

    async fn update_profile(&self, id: Uuid, name: &str, email: &str) -> StoreResult<Firm> {
        let mut tables = self.tables();
        if tables.firms.iter().any(|f| f.id != id && f.email == email) {
            return Err(StoreError::Conflict("firms_email_key".into()));
        }
        let firm = tables
            .firms
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("no firm {id}")))?;
        firm.name = name.into();
        firm.email = email.into();
        firm.updated_at = Utc::now();
        Ok(firm.clone())
    }

    async fn provision_for_account(
        &self,
        account_id: Uuid,
        owner_email: &str,
        profile: &SignupProfile,
    ) -> StoreResult<Firm> {
        let mut tables = self.tables();
        if tables.firms.iter().any(|f| f.slug == profile.firm_slug) {
            return Err(StoreError::Conflict("firms_slug_key".into()));
        }
        if tables.firms.iter().any(|f| f.email == owner_email) {
            return Err(StoreError::Conflict("firms_email_key".into()));
        }

        let now = Utc::now();
        let firm = Firm {
            id: Uuid::new_v4(),
            name: profile.firm_name.trim().into(),
            slug: profile.firm_slug.clone(),
            email: owner_email.into(),
            created_at: now,
            updated_at: now,
        };
        tables.firms.push(firm.clone());
        tables.memberships.retain(|(id, _, _)| *id != account_id);
        tables.memberships.push((account_id, Role::TenantMember, Some(firm.id)));
        if let Some(account) = tables.accounts.iter_mut().find(|a| a.id == account_id) {
            account.pending_firm_name = None;
            account.pending_firm_slug = None;
        }
        Ok(firm)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_for_account(&self, account_id: Uuid) -> StoreResult<Option<MembershipRecord>> {
        let tables = self.tables();
        let Some((_, role, firm_id)) = tables.memberships.iter().find(|(id, _, _)| *id == account_id) else {
            return Ok(None);
        };
        let firm = firm_id
            .and_then(|fid| tables.firms.iter().find(|f| f.id == fid))
            .map(|f| FirmRef { id: f.id, name: f.name.clone(), slug: f.slug.clone() });
        Ok(Some(MembershipRecord { account_id, role: *role, firm }))
    }

    async fn set_role(&self, account_id: Uuid, role: Role) -> StoreResult<()> {
        let mut tables = self.tables();
        match tables.memberships.iter_mut().find(|(id, _, _)| *id == account_id) {
            Some(membership) => membership.1 = role,
            None => tables.memberships.push((account_id, role, None)),
        }
        Ok(())
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn insert(&self, firm_id: Uuid, lead: &NewLead) -> StoreResult<Lead> {
        let lead = Lead {
            id: Uuid::new_v4(),
            firm_id,
            full_name: lead.full_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            submitted_at: Utc::now(),
        };
        self.tables().leads.push(lead.clone());
        Ok(lead)
    }

    async fn list_for_firm(&self, firm_id: Uuid) -> StoreResult<Vec<Lead>> {
        Ok(self
            .tables()
            .leads
            .iter()
            .rev()
            .filter(|l| l.firm_id == firm_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self.tables().accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.tables().accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn insert(
        &self,
        email: &str,
        password_hash: &str,
        profile: Option<&SignupProfile>,
    ) -> StoreResult<Account> {
        let mut tables = self.tables();
        if tables.accounts.iter().any(|a| a.email == email) {
            return Err(StoreError::Conflict("accounts_email_key".into()));
        }
        if let Some(slug) = profile.map(|p| p.firm_slug.as_str()) {
            if tables.accounts.iter().any(|a| a.pending_firm_slug.as_deref() == Some(slug)) {
                return Err(StoreError::Conflict("accounts_pending_firm_slug_key".into()));
            }
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            pending_firm_name: profile.map(|p| p.firm_name.trim().to_string()),
            pending_firm_slug: profile.map(|p| p.firm_slug.clone()),
            created_at: Utc::now(),
        };
        tables.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_credentials(
        &self,
        id: Uuid,
        email: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<()> {
        let mut tables = self.tables();
        if tables.accounts.iter().any(|a| a.id != id && a.email == email) {
            return Err(StoreError::Conflict("accounts_email_key".into()));
        }
        if let Some(account) = tables.accounts.iter_mut().find(|a| a.id == id) {
            account.email = email.into();
            if let Some(hash) = password_hash {
                account.password_hash = hash.into();
            }
        }
        Ok(())
    }

    async fn list_pending(&self) -> StoreResult<Vec<Account>> {
        Ok(self
            .tables()
            .accounts
            .iter()
            .filter(|a| a.pending_profile().is_some())
            .cloned()
            .collect())
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: None,
        jwt_secret: TEST_JWT_SECRET.into(),
        jwt_expiry_seconds: 3600,
        host: "127.0.0.1".into(),
        port: 0,
        app_base_url: "http://localhost:5173".into(),
        signup_poll: BackoffPolicy {
            max_attempts: 5,
            base_delay: std::time::Duration::from_millis(5),
            multiplier: 1.5,
            max_delay: std::time::Duration::from_millis(50),
            jitter: 0.0,
        },
    }
}

/// App state over `store`, with a live provisioning worker.
pub fn test_state(store: Arc<MemoryStore>) -> AppState {
    let stores = Stores::from_backend(store);
    AppState {
        provisioning: ProvisioningQueue::start(stores.clone()),
        stores,
        config: Arc::new(test_config()),
        redis: None,
    }
}
