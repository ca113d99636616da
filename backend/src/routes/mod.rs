//! Route definitions for the Dairy ERP backend

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes. Every route below requires a Bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/LabTests", lab_test_routes())
        .nest("/ProductionBatches", production_routes())
        .nest("/MilkCollections", collection_routes())
        .nest("/MilkCollectionSummaries", summary_routes())
        .nest("/Partners", partner_routes())
        .merge(reference_routes())
        .merge(role_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Laboratory routes
fn lab_test_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_lab_tests).post(handlers::create_lab_test),
        )
        .route(
            "/:id",
            get(handlers::get_lab_test)
                .put(handlers::update_lab_test)
                .delete(handlers::delete_lab_test),
        )
}

/// Production batch routes
fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:id", get(handlers::get_batch))
        .route("/:id/step", patch(handlers::apply_step_action))
        .route("/:id/params", put(handlers::update_params))
        .route("/:id/readings", get(handlers::list_readings))
}

/// Milk collection routes
fn collection_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_collections).post(handlers::create_collection),
        )
        .route(
            "/:id",
            get(handlers::get_collection)
                .put(handlers::update_collection)
                .delete(handlers::delete_collection),
        )
}

/// Monthly summary routes
fn summary_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_summaries))
        .route("/aggregate", get(handlers::aggregate_summaries))
        .route("/batch", post(handlers::save_summary_batch))
        .route("/finalize", post(handlers::finalize_summaries))
}

/// Partner routes
fn partner_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_partners).post(handlers::create_partner))
        .route("/import", post(handlers::import_partners))
        .route(
            "/:id",
            get(handlers::get_partner).put(handlers::update_partner),
        )
}

/// Collection points, vehicles and contracts
fn reference_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/SupplierGroups",
            get(handlers::list_supplier_groups).post(handlers::create_supplier_group),
        )
        .route(
            "/Vehicles",
            get(handlers::list_vehicles).post(handlers::create_vehicle),
        )
        .route("/Contracts", get(handlers::list_contracts))
}

/// Role and permission routes
fn role_routes() -> Router<AppState> {
    Router::new()
        .route("/Roles", get(handlers::list_roles))
        .route("/Permissions", get(handlers::list_permissions))
}
