//! Role and permission service
//!
//! The capability matrix lives in `shared::SystemRole`; the tables are a
//! projection of it that is rewritten on every start.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use shared::{Capability, SystemRole};

/// Role service for the seeded role matrix
#[derive(Clone)]
pub struct RoleService {
    db: PgPool,
}

/// Permission information
#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub key: String,
    pub module: String,
    pub action: String,
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: Uuid,
    key: String,
    description: Option<String>,
    is_system: bool,
}

/// Role with its capability keys
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleWithPermissions {
    pub id: Uuid,
    pub key: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub permissions: Vec<String>,
}

impl RoleService {
    /// Create a new RoleService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Upsert every capability and system role, and reset the grants of the
    /// system roles to the built-in matrix
    pub async fn seed_defaults(&self) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for capability in Capability::all() {
            sqlx::query(
                r#"
                INSERT INTO permissions (key, module, action)
                VALUES ($1, $2, $3)
                ON CONFLICT (key) DO NOTHING
                "#,
            )
            .bind(capability.key())
            .bind(capability.module.key())
            .bind(capability.action.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for role in SystemRole::ALL {
            let role_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO roles (key, description, is_system)
                VALUES ($1, $2, true)
                ON CONFLICT (key) DO UPDATE SET description = EXCLUDED.description
                RETURNING id
                "#,
            )
            .bind(role.key())
            .bind(role.description())
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
                .bind(role_id)
                .execute(&mut *tx)
                .await?;

            let keys: Vec<String> = role.capabilities().iter().map(Capability::key).collect();
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT $1, id FROM permissions WHERE key = ANY($2)
                "#,
            )
            .bind(role_id)
            .bind(&keys)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            roles = SystemRole::ALL.len(),
            permissions = Capability::all().len(),
            "role matrix seeded"
        );
        Ok(())
    }

    /// Get all roles with their permission keys
    pub async fn get_roles(&self) -> AppResult<Vec<RoleWithPermissions>> {
        let roles = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, key, description, is_system
            FROM roles
            ORDER BY is_system DESC, key ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let grants = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT rp.role_id, p.key
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            ORDER BY p.key
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(roles
            .into_iter()
            .map(|role| RoleWithPermissions {
                permissions: grants
                    .iter()
                    .filter(|(role_id, _)| *role_id == role.id)
                    .map(|(_, key)| key.clone())
                    .collect(),
                id: role.id,
                key: role.key,
                description: role.description,
                is_system: role.is_system,
            })
            .collect())
    }

    /// Get all available permissions
    pub async fn get_all_permissions(&self) -> AppResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, key, module, action
            FROM permissions
            ORDER BY module, action
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }
}
