use axum::{extract::State, Json};

use crate::{
    error::AppError,
    middleware::firm::MemberFirm,
    models::firm::UpdateAccountRequest,
    services::firms::{AccountSettings, FirmService},
    AppState,
};

pub async fn get_account(MemberFirm { firm, .. }: MemberFirm) -> Json<AccountSettings> {
    Json(AccountSettings::from(&firm))
}

pub async fn update_account(
    State(state): State<AppState>,
    MemberFirm { firm, principal }: MemberFirm,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<Json<AccountSettings>, AppError> {
    let saved = FirmService::update_account(&state.stores, &principal, &firm, &body).await?;
    Ok(Json(saved))
}
