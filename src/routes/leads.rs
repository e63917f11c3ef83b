use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::firm::MemberFirm,
    models::lead::SearchQuery,
    navigation,
    services::leads::LeadService,
    AppState,
};

pub async fn list_leads(
    State(state): State<AppState>,
    MemberFirm { firm, .. }: MemberFirm,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let leads = LeadService::search(state.stores.leads.as_ref(), &firm, query.q.as_deref()).await?;
    Ok(Json(json!({
        "firm": { "name": firm.name, "slug": firm.slug },
        "intake_url": format!("{}{}", state.config.app_base_url, navigation::intake_path(&firm.slug)),
        "total": leads.len(),
        "leads": leads,
    })))
}

pub async fn export_leads(
    State(state): State<AppState>,
    MemberFirm { firm, .. }: MemberFirm,
) -> Result<impl IntoResponse, AppError> {
    let leads = LeadService::search(state.stores.leads.as_ref(), &firm, None).await?;
    let body = LeadService::export_csv(&leads)?;
    let disposition = format!("attachment; filename=\"{}-leads.csv\"", firm.slug);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
