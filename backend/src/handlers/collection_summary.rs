//! HTTP handlers for monthly collection summaries

use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use shared::{Action, Capability, Module};

use crate::{
    error::AppResult,
    extract::{AppJson, AppQuery},
    middleware::CurrentUser,
    services::collection_summary::{CollectionSummaryService, SaveBatchInput, SummaryQuery},
    AppState,
};

/// Summaries of a month at a collection point
pub async fn list_summaries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<SummaryQuery>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::SUMMARIES, Action::View))?;

    let service = CollectionSummaryService::new(state.db);
    let summaries = service.list(query).await?;
    Ok(Json(summaries))
}

/// Figures proposed from the month's deliveries
pub async fn aggregate_summaries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<SummaryQuery>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::SUMMARIES, Action::View))?;

    let service = CollectionSummaryService::new(state.db);
    let proposed = service.aggregate(query).await?;
    Ok(Json(proposed))
}

/// Save a batch of draft rows
pub async fn save_summary_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<SaveBatchInput>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::SUMMARIES, Action::Edit))?;

    let service = CollectionSummaryService::new(state.db);
    let summaries = service.save_batch(&user.audit(), input).await?;
    Ok(Json(summaries))
}

/// Finalize the drafts of a month at a collection point
pub async fn finalize_summaries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(query): AppJson<SummaryQuery>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::new(Module::SUMMARIES, Action::Finalize))?;

    let service = CollectionSummaryService::new(state.db);
    let result = service.finalize(&user.audit(), query).await?;
    Ok(Json(result))
}
