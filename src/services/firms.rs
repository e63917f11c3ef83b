use serde::Serialize;
use tracing::info;

use crate::{
    db::store::Stores,
    error::AppError,
    models::{
        firm::{Firm, FirmOverview, UpdateAccountRequest},
        principal::Principal,
    },
    services::{
        auth::AuthService,
        metrics::FIRMS_GAUGE,
        validation::{validate_account_update, FIRM_EMAIL_TAKEN},
    },
};

/// Admin view of every firm. Totals always cover the whole directory, the
/// list is narrowed by the search term.
#[derive(Debug, Serialize)]
pub struct FirmDirectory {
    pub total_firms: usize,
    pub total_leads: i64,
    pub firms: Vec<FirmOverview>,
}

#[derive(Debug, Serialize)]
pub struct AccountSettings {
    pub firm_name: String,
    pub email: String,
    pub slug: String,
}

impl From<&Firm> for AccountSettings {
    fn from(firm: &Firm) -> Self {
        Self {
            firm_name: firm.name.clone(),
            email: firm.email.clone(),
            slug: firm.slug.clone(),
        }
    }
}

pub struct FirmService;

impl FirmService {
    pub async fn directory(stores: &Stores, term: Option<&str>) -> Result<FirmDirectory, AppError> {
        let all = stores.firms.list_overview().await?;
        FIRMS_GAUGE.set(all.len() as f64);

        let total_firms = all.len();
        let total_leads = all.iter().map(|f| f.lead_count).sum();
        let firms = match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => all.into_iter().filter(|f| f.matches(term)).collect(),
            None => all,
        };
        Ok(FirmDirectory { total_firms, total_leads, firms })
    }

    /// Saves the firm's name and contact email. The caller's own login email
    /// follows the firm email when the caller belongs to the firm, and a
    /// password change always applies to the caller's own account.
    pub async fn update_account(
        stores: &Stores,
        caller: &Principal,
        firm: &Firm,
        req: &UpdateAccountRequest,
    ) -> Result<AccountSettings, AppError> {
        validate_account_update(req)?;

        let email = req.email.trim().to_lowercase();
        let wants_password = req.new_password.as_deref().is_some_and(|p| !p.is_empty());
        let own_firm = caller.tenant_slug.as_deref() == Some(firm.slug.as_str());

        // Checked before any write so a clash leaves the login email untouched.
        if let Some(other) = stores.firms.find_by_owner_email(&email).await? {
            if other.id != firm.id {
                return Err(AppError::Conflict(FIRM_EMAIL_TAKEN.into()));
            }
        }

        if own_firm || wants_password {
            let login_email = if own_firm { email.as_str() } else { caller.email.as_str() };
            AuthService::update_credentials(
                stores.accounts.as_ref(),
                caller.id,
                login_email,
                req.current_password.as_deref(),
                req.new_password.as_deref(),
            )
            .await?;
        }

        let updated = stores
            .firms
            .update_profile(firm.id, req.firm_name.trim(), &email)
            .await?;
        info!(firm = %updated.slug, by = %caller.id, "account settings updated");
        Ok(AccountSettings::from(&updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{lead::NewLead, principal::Role},
        testing::MemoryStore,
    };
    use std::sync::Arc;

    fn member_of(firm: &Firm, id: uuid::Uuid, email: &str) -> Principal {
        Principal {
            id,
            email: email.into(),
            role: Role::TenantMember,
            tenant_name: Some(firm.name.clone()),
            tenant_slug: Some(firm.slug.clone()),
        }
    }

    fn update(name: &str, email: &str) -> UpdateAccountRequest {
        UpdateAccountRequest {
            firm_name: name.into(),
            email: email.into(),
            current_password: None,
            new_password: None,
            confirm_password: None,
        }
    }

    #[tokio::test]
    async fn directory_totals_ignore_filter() {
        let store = Arc::new(MemoryStore::new());
        let acme = store.add_firm("Acme Law", "acme", "owner@acme.com");
        store.add_firm("Smith & Jones", "smith-jones", "info@sj.com");
        let lead = NewLead { full_name: "Jane".into(), email: "j@x.com".into(), phone: "1".into() };
        crate::db::store::LeadStore::insert(store.as_ref(), acme.id, &lead).await.unwrap();

        let stores = Stores::from_backend(store);
        let directory = FirmService::directory(&stores, Some("SMITH")).await.unwrap();
        assert_eq!(directory.total_firms, 2);
        assert_eq!(directory.total_leads, 1);
        assert_eq!(directory.firms.len(), 1);
        assert_eq!(directory.firms[0].slug, "smith-jones");
    }

    #[tokio::test]
    async fn member_update_moves_login_email() {
        let store = Arc::new(MemoryStore::new());
        let firm = store.add_firm("Acme", "acme", "a@b.com");
        let account = AuthService::create_plain_account(store.as_ref(), "a@b.com", "secret1").await.unwrap();
        let stores = Stores::from_backend(store);
        let caller = member_of(&firm, account.id, "a@b.com");

        let saved = FirmService::update_account(&stores, &caller, &firm, &update("Acme LLP", "new@b.com"))
            .await
            .unwrap();
        assert_eq!(saved.firm_name, "Acme LLP");
        assert_eq!(saved.email, "new@b.com");
        assert!(AuthService::authenticate(stores.accounts.as_ref(), "new@b.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_current_password_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let firm = store.add_firm("Acme", "acme", "a@b.com");
        let account = AuthService::create_plain_account(store.as_ref(), "a@b.com", "secret1").await.unwrap();
        let stores = Stores::from_backend(store);
        let caller = member_of(&firm, account.id, "a@b.com");

        let mut req = update("Renamed", "a@b.com");
        req.current_password = Some("wrong".into());
        req.new_password = Some("newpass".into());
        req.confirm_password = Some("newpass".into());

        let result = FirmService::update_account(&stores, &caller, &firm, &req).await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
        let firm = stores.firms.find_by_slug("acme").await.unwrap().unwrap();
        assert_eq!(firm.name, "Acme");
    }

    #[tokio::test]
    async fn contact_email_of_another_firm_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let firm = store.add_firm("Acme", "acme", "a@b.com");
        store.add_firm("Other", "other", "o@b.com");
        let account = AuthService::create_plain_account(store.as_ref(), "a@b.com", "secret1").await.unwrap();
        let stores = Stores::from_backend(store);
        let caller = member_of(&firm, account.id, "a@b.com");

        match FirmService::update_account(&stores, &caller, &firm, &update("Acme LLP", "O@b.com")).await {
            Err(AppError::Conflict(message)) => assert_eq!(message, FIRM_EMAIL_TAKEN),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(AuthService::authenticate(stores.accounts.as_ref(), "a@b.com", "secret1").await.is_ok());
        assert!(stores.accounts.find_by_email("o@b.com").await.unwrap().is_none());
        let firm = stores.firms.find_by_slug("acme").await.unwrap().unwrap();
        assert_eq!((firm.name.as_str(), firm.email.as_str()), ("Acme", "a@b.com"));
    }
}
