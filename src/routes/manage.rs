use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppError,
    middleware::auth::AdminPrincipal,
    models::lead::SearchQuery,
    services::firms::{FirmDirectory, FirmService},
    AppState,
};

pub async fn list_firms(
    State(state): State<AppState>,
    AdminPrincipal(_admin): AdminPrincipal,
    Query(query): Query<SearchQuery>,
) -> Result<Json<FirmDirectory>, AppError> {
    Ok(Json(FirmService::directory(&state.stores, query.q.as_deref()).await?))
}
