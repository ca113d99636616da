//! HTTP handlers for production batches

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
    services::production::{
        BatchFilter, CreateBatchInput, ProductionService, StepActionInput, UpdateParamsInput,
    },
    AppState,
};

/// List production batches
pub async fn list_batches(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(filter): AppQuery<BatchFilter>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::BATCHES, Action::View))?;

    let service = ProductionService::new(state.db);
    let batches = service.list(filter).await?;
    Ok(Json(batches))
}

/// Get a batch by ID
pub async fn get_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::BATCHES, Action::View))?;

    let service = ProductionService::new(state.db);
    let batch = service.get(id).await?;
    Ok(Json(batch))
}

/// Start a batch
pub async fn create_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CreateBatchInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::BATCHES, Action::Create))?;

    let service = ProductionService::new(state.db);
    let batch = service.create(&user.audit(), input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Move a batch through its steps
pub async fn apply_step_action(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<StepActionInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::BATCHES, Action::Edit))?;

    let service = ProductionService::new(state.db);
    let batch = service.apply_step(&user.audit(), id, input).await?;
    Ok(Json(batch))
}

/// Record manual readings
pub async fn update_params(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateParamsInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::BATCHES, Action::Edit))?;

    let service = ProductionService::new(state.db);
    let batch = service.update_params(&user.audit(), id, input).await?;
    Ok(Json(batch))
}

/// Reading log of a batch
pub async fn list_readings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::BATCHES, Action::View))?;

    let service = ProductionService::new(state.db);
    let readings = service.list_readings(id).await?;
    Ok(Json(readings))
}
