use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    db::store::StoreError,
    services::{
        guard::Decision,
        validation::{FieldErrors, FIRM_EMAIL_TAKEN, SLUG_TAKEN},
    },
};

/// Every failure a request can end in. None of them is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Conflict(String),
    /// A guard decision other than `Render`.
    #[error("access denied")]
    Denied(Decision),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Too many attempts. Try again in a few minutes.")]
    RateLimited,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(constraint) if constraint.contains("slug") => {
                AppError::Conflict(SLUG_TAKEN.into())
            }
            StoreError::Conflict(constraint) if constraint.starts_with("firms_email") => {
                AppError::Conflict(FIRM_EMAIL_TAKEN.into())
            }
            StoreError::Conflict(constraint) if constraint.contains("email") => {
                AppError::Conflict("An account with this email already exists".into())
            }
            StoreError::Conflict(constraint) => {
                AppError::Conflict(format!("Duplicate value ({constraint})"))
            }
            StoreError::Other(e) => AppError::Backend(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "Validation failed", "errors": errors })),
            )
                .into_response(),
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Denied(decision) => denied_response(&decision),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{what} not found") })),
            )
                .into_response(),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": AppError::RateLimited.to_string() })),
            )
                .into_response(),
            AppError::Backend(e) => {
                tracing::error!("backend error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Something went wrong. Please try again." })),
                )
                    .into_response()
            }
        }
    }
}

fn denied_response(decision: &Decision) -> Response {
    let (status, message) = match decision {
        Decision::Pending => (StatusCode::SERVICE_UNAVAILABLE, "Session is still resolving"),
        Decision::Render => (StatusCode::OK, ""),
        Decision::RedirectToLogin => (StatusCode::UNAUTHORIZED, "Authentication required"),
        Decision::RedirectHome { notice } => (
            StatusCode::FORBIDDEN,
            notice.map(|n| n.message()).unwrap_or("Access denied"),
        ),
        Decision::RedirectToOwnDashboard { .. } => (StatusCode::FORBIDDEN, "Access denied"),
    };
    let redirect = decision.redirect_path();

    let mut response = (
        status,
        Json(json!({ "error": message, "notice": decision.notice(), "redirect": redirect.clone() })),
    )
        .into_response();
    if let Some(location) = redirect.and_then(|r| HeaderValue::from_str(&r).ok()) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    response
}
