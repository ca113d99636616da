//! HTTP handlers for collection points, vehicles and contracts

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::{Action, Capability, Module};

use crate::{
    error::AppResult,
    extract::{AppJson, AppQuery},
    middleware::CurrentUser,
    services::reference::{
        ContractFilter, CreateSupplierGroupInput, CreateVehicleInput, ReferenceService,
    },
    AppState,
};

pub async fn list_supplier_groups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::View))?;

    let service = ReferenceService::new(state.db);
    Ok(Json(service.list_supplier_groups().await?))
}

pub async fn create_supplier_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CreateSupplierGroupInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::PARTNERS, Action::Create))?;

    let service = ReferenceService::new(state.db);
    let group = service.create_supplier_group(&user.audit(), input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::VEHICLES, Action::View))?;

    let service = ReferenceService::new(state.db);
    Ok(Json(service.list_vehicles().await?))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CreateVehicleInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::VEHICLES, Action::Create))?;

    let service = ReferenceService::new(state.db);
    let vehicle = service.create_vehicle(&user.audit(), input).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn list_contracts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(filter): AppQuery<ContractFilter>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::CONTRACTS, Action::View))?;

    let service = ReferenceService::new(state.db);
    Ok(Json(service.list_contracts(filter).await?))
}
