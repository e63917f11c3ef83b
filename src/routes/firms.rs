use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::{
        firm::PublicFirm,
        rate_limit::{check_rate_limit, real_ip},
    },
    models::lead::NewLead,
    navigation,
    services::leads::LeadService,
    AppState,
};

/// Public landing page data.
pub async fn landing(PublicFirm(firm): PublicFirm) -> Json<Value> {
    Json(json!({
        "name": firm.name,
        "slug": firm.slug,
        "intake_path": navigation::intake_path(&firm.slug),
    }))
}

pub async fn submit_intake(
    State(state): State<AppState>,
    PublicFirm(firm): PublicFirm,
    headers: HeaderMap,
    Json(body): Json<NewLead>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Rate limit: 5 submissions/hour per IP and firm
    let ip = real_ip(&headers);
    let key = format!("rate:intake:{}:{ip}", firm.slug);
    check_rate_limit(state.redis.as_ref(), &key, 5, 3600).await?;

    let lead = LeadService::submit(state.stores.leads.as_ref(), &firm, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": lead.id,
            "message": format!("Thank you. {} will contact you shortly.", firm.name),
        })),
    ))
}
