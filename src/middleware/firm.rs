use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::{
    error::AppError,
    middleware::auth::CurrentSession,
    models::{
        firm::{Firm, Slug},
        principal::Principal,
    },
    services::{
        guard::{authorize, RouteRequirement},
        session::SessionState,
    },
    AppState,
};

async fn path_slug(parts: &mut Parts, state: &AppState) -> Result<String, AppError> {
    let Path(slug) = Path::<String>::from_request_parts(parts, state)
        .await
        .map_err(|_| AppError::NotFound("Firm"))?;
    Ok(slug)
}

async fn load_firm(state: &AppState, raw_slug: &str) -> Result<Firm, AppError> {
    let slug = Slug::parse(raw_slug).map_err(|_| AppError::NotFound("Firm"))?;
    state
        .stores
        .firms
        .find_by_slug(slug.as_str())
        .await?
        .ok_or(AppError::NotFound("Firm"))
}

/// The firm named by the `{slug}` path segment, for public pages.
#[derive(Debug, Clone)]
pub struct PublicFirm(pub Firm);

impl FromRequestParts<AppState> for PublicFirm {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = path_slug(parts, state).await?;
        Ok(PublicFirm(load_firm(state, &slug).await?))
    }
}

/// The firm named by the `{slug}` path segment, behind the access guard.
///
/// The guard runs before the firm is looked up, so an anonymous caller is
/// sent to the login page whether or not the slug exists.
#[derive(Debug, Clone)]
pub struct MemberFirm {
    pub firm: Firm,
    pub principal: Principal,
}

impl FromRequestParts<AppState> for MemberFirm {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = path_slug(parts, state).await?;
        let current = CurrentSession::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        authorize(&current.state, RouteRequirement::Authenticated, Some(&slug))?;

        let SessionState::Resolved(principal) = current.state else {
            return Err(AppError::Authentication("Authentication required".into()));
        };
        let firm = load_firm(state, &slug).await?;
        Ok(MemberFirm { firm, principal })
    }
}
