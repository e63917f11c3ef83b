//! UI path shapes used as navigation targets.

use crate::models::principal::{Principal, Role};
use crate::services::guard::RouteRequirement;

pub const HOME: &str = "/";
pub const LOGIN: &str = "/login";
pub const SIGNUP: &str = "/signup";
pub const MANAGE: &str = "/manage";

pub fn intake_path(slug: &str) -> String {
    format!("/{slug}/intake")
}

pub fn dashboard_path(slug: &str) -> String {
    format!("/{slug}/back/leads")
}

/// Where a freshly signed-in principal lands.
pub fn home_for(principal: Option<&Principal>) -> String {
    match principal {
        Some(p) => match (p.role, p.tenant_slug.as_deref()) {
            (Role::Admin, _) => MANAGE.to_string(),
            (Role::TenantMember, Some(slug)) => dashboard_path(slug),
            (Role::TenantMember, None) => HOME.to_string(),
        },
        None => HOME.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    SignUp,
    Manage,
    Landing(String),
    Intake(String),
    Leads(String),
    Account(String),
    /// Any other path under `/:slug/back`; not found, but only once the
    /// guard lets the caller in.
    BackOffice(String),
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let segments: Vec<&str> = path
            .split('?')
            .next()
            .unwrap_or(path)
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["signup"] => Route::SignUp,
            ["manage"] | ["admin"] => Route::Manage,
            [slug] => Route::Landing(slug.to_string()),
            [slug, "intake"] => Route::Intake(slug.to_string()),
            // `/:slug/back` lands on the leads dashboard
            [slug, "back"] | [slug, "back", "leads"] => Route::Leads(slug.to_string()),
            [slug, "back", "account"] => Route::Account(slug.to_string()),
            [slug, "back", ..] => Route::BackOffice(slug.to_string()),
            _ => Route::NotFound,
        }
    }

    /// Guard parameters for protected routes; `None` for public ones.
    pub fn protection(&self) -> Option<(RouteRequirement, Option<&str>)> {
        match self {
            Route::Manage => Some((RouteRequirement::Admin, None)),
            Route::Leads(slug) | Route::Account(slug) | Route::BackOffice(slug) => {
                Some((RouteRequirement::Authenticated, Some(slug.as_str())))
            }
            Route::Home
            | Route::Login
            | Route::SignUp
            | Route::Landing(_)
            | Route::Intake(_)
            | Route::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn principal(role: Role, slug: Option<&str>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "x@y.com".into(),
            role,
            tenant_name: None,
            tenant_slug: slug.map(str::to_string),
        }
    }

    #[test]
    fn parses_the_routing_surface() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/admin"), Route::Manage);
        assert_eq!(Route::parse("/acme"), Route::Landing("acme".into()));
        assert_eq!(Route::parse("/acme/intake"), Route::Intake("acme".into()));
        assert_eq!(Route::parse("/acme/back"), Route::Leads("acme".into()));
        assert_eq!(Route::parse("/acme/back/leads?q=x"), Route::Leads("acme".into()));
        assert_eq!(Route::parse("/acme/back/account/"), Route::Account("acme".into()));
        assert_eq!(Route::parse("/acme/back/other"), Route::BackOffice("acme".into()));
        assert_eq!(Route::parse("/acme/other"), Route::NotFound);
    }

    #[test]
    fn only_back_office_routes_are_protected() {
        assert_eq!(
            Route::parse("/acme/back/leads").protection(),
            Some((RouteRequirement::Authenticated, Some("acme")))
        );
        assert_eq!(Route::Manage.protection(), Some((RouteRequirement::Admin, None)));
        for path in ["/acme/back/settings", "/acme/back/leads/123"] {
            assert_eq!(
                Route::parse(path).protection(),
                Some((RouteRequirement::Authenticated, Some("acme"))),
                "{path} should be guarded"
            );
        }
        assert_eq!(Route::parse("/acme/intake").protection(), None);
        assert_eq!(Route::parse("/acme/other").protection(), None);
    }

    #[test]
    fn landing_depends_on_role() {
        assert_eq!(home_for(Some(&principal(Role::Admin, None))), "/manage");
        assert_eq!(home_for(Some(&principal(Role::TenantMember, Some("acme")))), "/acme/back/leads");
        assert_eq!(home_for(Some(&principal(Role::TenantMember, None))), "/");
        assert_eq!(home_for(None), "/");
    }
}
