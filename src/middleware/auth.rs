use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{
    error::AppError,
    models::{auth::Session, principal::Principal},
    services::{
        auth::decode_session_token,
        guard::{authorize, RouteRequirement},
        session::{resolve_principal, SessionState},
    },
    AppState,
};

/// The caller's session state, resolved from the bearer token.
///
/// A request never fails to extract this: a missing, expired or malformed
/// token, an account without membership, and a failed membership lookup
/// all come out as `Unauthenticated`.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session: Option<Session>,
    pub state: SessionState,
}

impl CurrentSession {
    fn unauthenticated() -> Self {
        Self { session: None, state: SessionState::Unauthenticated }
    }
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self::unauthenticated());
        };

        let session = match decode_session_token(token, &state.config.jwt_secret) {
            Ok(session) => session,
            Err(_) => return Ok(Self::unauthenticated()),
        };

        let resolved = match resolve_principal(state.stores.memberships.as_ref(), &session).await {
            Ok(Some(principal)) => SessionState::Resolved(principal),
            Ok(None) => SessionState::Unauthenticated,
            Err(e) => {
                warn!(account = %session.account_id, "principal lookup failed: {e}");
                SessionState::Unauthenticated
            }
        };

        Ok(Self { session: Some(session), state: resolved })
    }
}

/// A caller holding the admin role; everyone else gets the guard's redirect.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentSession::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        authorize(&current.state, RouteRequirement::Admin, None)?;
        match current.state {
            SessionState::Resolved(principal) => Ok(AdminPrincipal(principal)),
            _ => Err(AppError::Authentication("Authentication required".into())),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
