//! One user agent's view of the app: its identity provider, the session
//! slot that follows it, and the navigation rules built on both.

use std::sync::Arc;

use tracing::info;

use crate::{
    db::store::Stores,
    error::AppError,
    models::{
        account::SignupProfile,
        auth::{LoginRequest, SignupRequest},
    },
    navigation::{self, Route},
    services::{
        auth::normalize_email,
        guard::{decide, Decision, RouteRequirement},
        identity::IdentityProvider,
        poller::{resolve_dashboard_slug, BackoffPolicy},
        session::{resolve_principal, SessionHandle, SessionResolver},
        validation::{check_signup_available, validate_login, validate_signup},
    },
};

pub struct Portal {
    identity: Arc<dyn IdentityProvider>,
    stores: Stores,
    session: SessionHandle,
    backoff: BackoffPolicy,
}

impl Portal {
    pub fn new(identity: Arc<dyn IdentityProvider>, stores: Stores, backoff: BackoffPolicy) -> Self {
        let session = SessionResolver::spawn(identity.clone(), stores.memberships.clone());
        Self { identity, stores, session, backoff }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Signs in and returns where to go next: the admin area, the member's
    /// own dashboard, or home when the account has no firm.
    pub async fn login(&self, form: &LoginRequest) -> Result<String, AppError> {
        validate_login(form)?;
        let session = self.identity.sign_in(&form.email, &form.password).await?;
        let principal = resolve_principal(self.stores.memberships.as_ref(), &session).await?;
        Ok(navigation::home_for(principal.as_ref()))
    }

    /// Creates the account and returns the new firm's dashboard path.
    ///
    /// The firm row is written by the provisioner after signup, so its slug
    /// is polled for with backoff; when it does not show up in time the slug
    /// from the form is used instead.
    pub async fn sign_up(&self, form: &SignupRequest) -> Result<String, AppError> {
        let slug = validate_signup(form)?;
        let email = normalize_email(&form.email);
        check_signup_available(self.stores.firms.as_ref(), &email, &slug).await?;

        let profile = SignupProfile {
            firm_name: form.firm_name.trim().to_string(),
            firm_slug: slug.to_string(),
        };
        self.identity.sign_up(&form.email, &form.password, &profile).await?;

        let dashboard_slug = resolve_dashboard_slug(
            self.stores.firms.as_ref(),
            &email,
            slug.as_str(),
            &self.backoff,
        )
        .await;

        // The first principal lookup may have run before the membership existed.
        if let Err(e) = self.identity.refresh().await {
            tracing::warn!("session refresh after signup failed: {e}");
        }

        info!(slug = %dashboard_slug, "signup complete");
        Ok(navigation::dashboard_path(&dashboard_slug))
    }

    pub async fn logout(&self) -> String {
        self.identity.sign_out().await;
        navigation::HOME.to_string()
    }

    /// Access decision once the session has settled.
    pub async fn guard(&self, requirement: RouteRequirement, slug: Option<&str>) -> Decision {
        let state = self.session.settled().await;
        decide(&state, requirement, slug)
    }

    /// Access decision for a UI path. Unprotected paths always render.
    pub async fn visit(&self, path: &str) -> Decision {
        let route = Route::parse(path);
        match route.protection() {
            Some((requirement, slug)) => self.guard(requirement, slug).await,
            None => Decision::Render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::store::{AccountStore, FirmStore},
        models::principal::Role,
        services::{
            auth::AuthService, guard::Notice, identity::LocalIdentityProvider,
            provisioning::ProvisioningQueue,
        },
        testing::{test_config, MemoryStore, TEST_JWT_SECRET},
    };

    fn portal(store: &Arc<MemoryStore>, queue: ProvisioningQueue) -> Portal {
        let stores = Stores::from_backend(store.clone());
        let identity = Arc::new(LocalIdentityProvider::new(
            stores.accounts.clone(),
            queue,
            TEST_JWT_SECRET,
            3600,
        ));
        Portal::new(identity, stores, test_config().signup_poll)
    }

    fn signup_form(email: &str, name: &str, slug: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: "secret1".into(),
            firm_name: name.into(),
            firm_slug: slug.into(),
        }
    }

    fn login_form(email: &str) -> LoginRequest {
        LoginRequest { email: email.into(), password: "secret1".into() }
    }

    #[tokio::test]
    async fn sign_up_lands_on_new_dashboard() {
        let store = Arc::new(MemoryStore::new());
        let queue = ProvisioningQueue::start(Stores::from_backend(store.clone()));
        let portal = portal(&store, queue);

        let target = portal.sign_up(&signup_form("a@b.com", "Acme", "acme")).await.unwrap();
        assert_eq!(target, "/acme/back/leads");

        let firm = store.find_by_slug("acme").await.unwrap().unwrap();
        assert_eq!(firm.name, "Acme");
        assert_eq!(firm.email, "a@b.com");

        let state = portal.session().wait_for(|s| s.principal().is_some()).await;
        assert_eq!(state.principal().unwrap().tenant_slug.as_deref(), Some("acme"));
        assert_eq!(portal.visit("/acme/back/leads").await, Decision::Render);
        assert_eq!(
            portal.visit("/other/back/leads").await,
            Decision::RedirectToOwnDashboard { slug: "acme".into() }
        );
    }

    #[tokio::test]
    async fn sign_up_falls_back_to_form_slug() {
        let store = Arc::new(MemoryStore::new());
        // No worker: the firm never appears.
        let (queue, _rx) = ProvisioningQueue::detached();
        let portal = portal(&store, queue);

        let target = portal.sign_up(&signup_form("a@b.com", "Acme", "acme")).await.unwrap();
        assert_eq!(target, "/acme/back/leads");
        assert!(store.find_by_slug("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_up_rejects_taken_and_reserved_slugs() {
        let store = Arc::new(MemoryStore::new());
        store.add_firm("Existing", "acme", "owner@acme.com");
        let (queue, _rx) = ProvisioningQueue::detached();
        let portal = portal(&store, queue);

        match portal.sign_up(&signup_form("a@b.com", "Acme", "acme")).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("firm_slug"), Some("This firm URL is already taken"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(matches!(
            portal.sign_up(&signup_form("a@b.com", "Acme", "manage")).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.find_by_email("a@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_up_rejects_email_listed_by_another_firm() {
        let store = Arc::new(MemoryStore::new());
        store.add_firm("Globex", "globex", "a@b.com");
        let queue = ProvisioningQueue::start(Stores::from_backend(store.clone()));
        let portal = portal(&store, queue);

        match portal.sign_up(&signup_form("A@B.com", "Acme", "acme")).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("email"), Some("A firm already uses this email"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.find_by_email("a@b.com").await.unwrap().is_none());
        assert!(store.find_by_slug("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_targets_depend_on_role() {
        let store = Arc::new(MemoryStore::new());
        let firm = store.add_firm("Acme", "acme", "a@b.com");
        let member = AuthService::create_plain_account(store.as_ref(), "a@b.com", "secret1").await.unwrap();
        store.add_membership(member.id, Role::TenantMember, Some(firm.id));
        let admin = AuthService::create_plain_account(store.as_ref(), "root@b.com", "secret1").await.unwrap();
        store.add_membership(admin.id, Role::Admin, None);
        let unbound = AuthService::create_plain_account(store.as_ref(), "x@b.com", "secret1").await.unwrap();
        store.add_membership(unbound.id, Role::TenantMember, None);

        let (queue, _rx) = ProvisioningQueue::detached();
        let portal = portal(&store, queue);

        assert_eq!(portal.login(&login_form("a@b.com")).await.unwrap(), "/acme/back/leads");
        assert_eq!(portal.login(&login_form("root@b.com")).await.unwrap(), "/manage");
        assert_eq!(portal.login(&login_form("x@b.com")).await.unwrap(), "/");

        portal.session().wait_for(|s| s.principal().is_some_and(|p| p.id == unbound.id)).await;
        assert_eq!(
            portal.visit("/acme/back/leads").await,
            Decision::RedirectHome { notice: Some(Notice::MissingTenantBinding) }
        );
        assert_eq!(
            portal.visit("/manage").await,
            Decision::RedirectHome { notice: Some(Notice::AuthorizationDenied) }
        );
    }

    #[tokio::test]
    async fn logout_sends_protected_routes_to_login() {
        let store = Arc::new(MemoryStore::new());
        let firm = store.add_firm("Acme", "acme", "a@b.com");
        let member = AuthService::create_plain_account(store.as_ref(), "a@b.com", "secret1").await.unwrap();
        store.add_membership(member.id, Role::TenantMember, Some(firm.id));
        let (queue, _rx) = ProvisioningQueue::detached();
        let portal = portal(&store, queue);

        portal.login(&login_form("a@b.com")).await.unwrap();
        portal.session().wait_for(|s| s.principal().is_some()).await;

        assert_eq!(portal.logout().await, "/");
        portal.session().wait_for(|s| s.principal().is_none() && s.is_settled()).await;
        assert_eq!(portal.visit("/acme/back/leads").await, Decision::RedirectToLogin);
        assert_eq!(portal.visit("/acme/back/settings").await, Decision::RedirectToLogin);
        assert_eq!(portal.visit("/acme/back/leads/123").await, Decision::RedirectToLogin);
        assert_eq!(portal.visit("/acme").await, Decision::Render);
    }
}
