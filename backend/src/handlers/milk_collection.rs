//! HTTP handlers for milk collection entries

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
    services::milk_collection::{CollectionFilter, CollectionInput, MilkCollectionService},
    AppState,
};

/// List deliveries
pub async fn list_collections(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(filter): AppQuery<CollectionFilter>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::COLLECTIONS, Action::View))?;

    let service = MilkCollectionService::new(state.db);
    let entries = service.list(filter).await?;
    Ok(Json(entries))
}

/// Get a delivery by ID
pub async fn get_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::COLLECTIONS, Action::View))?;

    let service = MilkCollectionService::new(state.db);
    let entry = service.get(id).await?;
    Ok(Json(entry))
}

/// Record a delivery
pub async fn create_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CollectionInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::COLLECTIONS, Action::Create))?;

    let service = MilkCollectionService::new(state.db);
    let entry = service.create(&user.audit(), input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Update a delivery
pub async fn update_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<CollectionInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::COLLECTIONS, Action::Edit))?;

    let service = MilkCollectionService::new(state.db);
    let entry = service.update(&user.audit(), id, input).await?;
    Ok(Json(entry))
}

/// Soft delete a delivery
pub async fn delete_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::COLLECTIONS, Action::Delete))?;

    let service = MilkCollectionService::new(state.db);
    service.delete(&user.audit(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
