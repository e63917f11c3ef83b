//! Access decisions for protected views.
//!
//! [`decide`] is a pure function of the session state, the route's role
//! requirement and its `:slug` parameter. Callers act on the returned
//! [`Decision`]; notices and navigation are theirs to push.

use serde::Serialize;

use crate::{error::AppError, navigation, services::session::SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    AuthorizationDenied,
    /// A tenant member whose membership has no firm attached.
    MissingTenantBinding,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::AuthorizationDenied => "You are not authorized to view this page",
            Notice::MissingTenantBinding => "Your account is not linked to a law firm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Identity resolution still in flight.
    Pending,
    Render,
    RedirectToLogin,
    RedirectHome { notice: Option<Notice> },
    RedirectToOwnDashboard { slug: String },
}

impl Decision {
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Decision::Pending | Decision::Render => None,
            Decision::RedirectToLogin => Some(navigation::LOGIN.to_string()),
            Decision::RedirectHome { .. } => Some(navigation::HOME.to_string()),
            Decision::RedirectToOwnDashboard { slug } => Some(navigation::dashboard_path(slug)),
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        match self {
            Decision::RedirectHome { notice } => *notice,
            _ => None,
        }
    }
}

pub fn decide(
    state: &SessionState,
    requirement: RouteRequirement,
    route_slug: Option<&str>,
) -> Decision {
    let principal = match state {
        SessionState::Resolving => return Decision::Pending,
        SessionState::Unauthenticated => return Decision::RedirectToLogin,
        SessionState::Resolved(principal) => principal,
    };

    if requirement == RouteRequirement::Admin && !principal.is_admin() {
        return Decision::RedirectHome {
            notice: Some(Notice::AuthorizationDenied),
        };
    }

    // Admins may view any tenant.
    if let (Some(slug), false) = (route_slug, principal.is_admin()) {
        match principal.tenant_slug.as_deref() {
            None => {
                return Decision::RedirectHome {
                    notice: Some(Notice::MissingTenantBinding),
                }
            }
            Some(own) if own != slug => {
                return Decision::RedirectToOwnDashboard {
                    slug: own.to_string(),
                }
            }
            Some(_) => {}
        }
    }

    Decision::Render
}

/// Server-side form of [`decide`]: anything but `Render` becomes an error
/// response carrying the redirect.
pub fn authorize(
    state: &SessionState,
    requirement: RouteRequirement,
    route_slug: Option<&str>,
) -> Result<(), AppError> {
    match decide(state, requirement, route_slug) {
        Decision::Render => Ok(()),
        other => {
            if let Some(notice) = other.notice() {
                tracing::info!(?notice, slug = ?route_slug, "access denied");
            }
            Err(AppError::Denied(other))
        }
    }
}
