pub mod account;
pub mod auth;
pub mod firms;
pub mod health;
pub mod leads;
pub mod manage;
pub mod metrics;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Auth
        .route("/auth/signup", post(auth::signup))
        .route("/auth/check-slug", get(auth::check_slug))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Public firm pages
        .route("/firms/{slug}", get(firms::landing))
        .route("/firms/{slug}/intake", post(firms::submit_intake))
        // Firm back office
        .route("/firms/{slug}/leads", get(leads::list_leads))
        .route("/firms/{slug}/leads/export", get(leads::export_leads))
        .route("/firms/{slug}/account", get(account::get_account).put(account::update_account))
        // Admin
        .route("/manage/firms", get(manage::list_firms))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
