use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::AppError,
    middleware::{
        auth::CurrentSession,
        rate_limit::{check_rate_limit, real_ip},
    },
    models::{
        account::SignupProfile,
        auth::{AuthResponse, LoginRequest, SignupRequest},
        firm::Slug,
    },
    navigation,
    services::{
        auth::{normalize_email, AuthService},
        metrics::{LOGINS_COUNTER, SIGNUPS_COUNTER},
        poller::resolve_dashboard_slug,
        session::resolve_principal,
        validation::{check_signup_available, validate_login, validate_signup, SLUG_TAKEN},
    },
    AppState,
};

pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let ip = real_ip(&headers);
    check_rate_limit(state.redis.as_ref(), &format!("rate:signup:ip:{ip}"), 5, 3600).await?;

    let slug = validate_signup(&body)?;
    check_signup_available(state.stores.firms.as_ref(), &normalize_email(&body.email), &slug).await?;

    let profile = SignupProfile {
        firm_name: body.firm_name.trim().to_string(),
        firm_slug: slug.to_string(),
    };
    let account = match AuthService::register(
        state.stores.accounts.as_ref(),
        &state.provisioning,
        &body.email,
        &body.password,
        &profile,
    )
    .await
    {
        Ok(account) => account,
        Err(e) => {
            SIGNUPS_COUNTER.with_label_values(&["rejected"]).inc();
            return Err(e);
        }
    };
    let session = AuthService::issue_session(&account, &state.config.jwt_secret, state.config.jwt_expiry_seconds)?;

    // Provisioning runs in the background; wait a bounded while for it.
    let dashboard_slug = resolve_dashboard_slug(
        state.stores.firms.as_ref(),
        &account.email,
        slug.as_str(),
        &state.config.signup_poll,
    )
    .await;
    let principal = resolve_principal(state.stores.memberships.as_ref(), &session)
        .await
        .unwrap_or_default();

    SIGNUPS_COUNTER.with_label_values(&["success"]).inc();
    info!(account = %account.id, slug = %dashboard_slug, "signup completed");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: session.access_token,
            principal,
            redirect: navigation::dashboard_path(&dashboard_slug),
        }),
    ))
}

#[derive(Deserialize)]
pub struct CheckSlugQuery {
    pub slug: String,
}

pub async fn check_slug(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CheckSlugQuery>,
) -> Result<Json<Value>, AppError> {
    // Backstop against enumeration; the form calls this on every keystroke.
    let ip = real_ip(&headers);
    check_rate_limit(state.redis.as_ref(), &format!("rate:check-slug:ip:{ip}"), 30, 60).await?;

    let slug = match Slug::parse_for_signup(params.slug.trim()) {
        Ok(slug) => slug,
        Err(e) => return Ok(Json(json!({ "available": false, "reason": e.to_string() }))),
    };
    if state.stores.firms.slug_taken(slug.as_str()).await? {
        return Ok(Json(json!({ "available": false, "reason": SLUG_TAKEN })));
    }
    Ok(Json(json!({ "available": true })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_login(&body)?;

    // Rate limit: 5 attempts per 15 min per email
    let rate_key = format!("rate:login:{}", normalize_email(&body.email));
    check_rate_limit(state.redis.as_ref(), &rate_key, 5, 900).await?;

    let account = match AuthService::authenticate(state.stores.accounts.as_ref(), &body.email, &body.password).await {
        Ok(account) => account,
        Err(e) => {
            LOGINS_COUNTER.with_label_values(&["failure"]).inc();
            return Err(e);
        }
    };
    let session = AuthService::issue_session(&account, &state.config.jwt_secret, state.config.jwt_expiry_seconds)?;
    let principal = resolve_principal(state.stores.memberships.as_ref(), &session).await?;

    LOGINS_COUNTER.with_label_values(&["success"]).inc();
    Ok(Json(AuthResponse {
        access_token: session.access_token,
        redirect: navigation::home_for(principal.as_ref()),
        principal,
    }))
}

/// Tokens are stateless; the client drops its copy.
pub async fn logout(current: CurrentSession) -> Json<Value> {
    if let Some(session) = current.session {
        info!(account = %session.account_id, "logout");
    }
    Json(json!({ "message": "Logged out", "redirect": navigation::HOME }))
}

pub async fn me(current: CurrentSession) -> Result<Json<Value>, AppError> {
    match current.state.principal() {
        Some(principal) => Ok(Json(json!({
            "principal": principal,
            "home": navigation::home_for(Some(principal)),
        }))),
        None => Err(AppError::Authentication("Not signed in".into())),
    }
}
