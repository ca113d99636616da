//! Role and permission handlers

use axum::{extract::State, Json};
use serde::Serialize;
use shared::{Action, Capability, Module};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::role::{Permission, RoleWithPermissions};
use crate::services::RoleService;
use crate::AppState;

/// Response for list of roles
#[derive(Serialize)]
pub struct RolesResponse {
    pub roles: Vec<RoleWithPermissions>,
}

/// Response for list of permissions
#[derive(Serialize)]
pub struct PermissionsResponse {
    pub permissions: Vec<Permission>,
}

/// Get all roles with their permissions
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<RolesResponse>, AppError> {
    user.require(Capability::new(Module::ROLES, Action::View))?;

    let role_service = RoleService::new(state.db.clone());
    let roles = role_service.get_roles().await?;

    Ok(Json(RolesResponse { roles }))
}

/// Get all available permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PermissionsResponse>, AppError> {
    user.require(Capability::new(Module::ROLES, Action::View))?;

    let role_service = RoleService::new(state.db.clone());
    let permissions = role_service.get_all_permissions().await?;

    Ok(Json(PermissionsResponse { permissions }))
}
