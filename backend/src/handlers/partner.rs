//! HTTP handlers for partners and the partner import

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::{Action, Capability, Module};
use uuid::Uuid;

use crate::{
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::CurrentUser,
    services::{
        partner::{PartnerFilter, PartnerInput, PartnerService},
        PartnerImportService,
    },
    AppState,
};

/// List partners
pub async fn list_partners(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(filter): AppQuery<PartnerFilter>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::View))?;

    let service = PartnerService::new(state.db);
    let partners = service.list(filter).await?;
    Ok(Json(partners))
}

/// Get a partner by ID
pub async fn get_partner(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::View))?;

    let service = PartnerService::new(state.db);
    let partner = service.get(id).await?;
    Ok(Json(partner))
}

/// Create a partner
pub async fn create_partner(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<PartnerInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::Create))?;

    let service = PartnerService::new(state.db);
    let partner = service.create(&user.audit(), input).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

/// Update a partner
pub async fn update_partner(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<PartnerInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::Edit))?;

    let service = PartnerService::new(state.db);
    let partner = service.update(&user.audit(), id, input).await?;
    Ok(Json(partner))
}

/// Import partners and contracts from a CSV body
pub async fn import_partners(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: String,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::Import))?;

    let service = PartnerImportService::new(state.db, state.config.import.match_policy);
    let report = service.import_csv(&user.audit(), &body).await?;
    Ok(Json(report))
}
