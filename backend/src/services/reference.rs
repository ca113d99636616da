//! Reference data: collection points (supplier groups), vehicles and contracts

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{normalize_plate_number, validate_plate_number};

/// Reference data service
#[derive(Clone)]
pub struct ReferenceService {
    db: PgPool,
}

/// Supplier group, also used as collection point
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupplierGroup {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupplierGroupInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub location: Option<String>,
}

/// Collection vehicle
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub plate_number: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehicleInput {
    pub plate_number: String,
    pub description: Option<String>,
}

/// Supply contract
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub contract_number: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub price_per_liter: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractFilter {
    pub partner_id: Option<Uuid>,
}

impl ReferenceService {
    /// Create a new ReferenceService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_supplier_groups(&self) -> AppResult<Vec<SupplierGroup>> {
        let groups = sqlx::query_as::<_, SupplierGroup>(
            "SELECT id, name, location, created_at FROM supplier_groups ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(groups)
    }

    pub async fn create_supplier_group(
        &self,
        audit: &AuditContext,
        input: CreateSupplierGroupInput,
    ) -> AppResult<SupplierGroup> {
        input.validate()?;

        let group = sqlx::query_as::<_, SupplierGroup>(
            r#"
            INSERT INTO supplier_groups (name, location)
            VALUES ($1, $2)
            RETURNING id, name, location, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.location)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            AppError::from(e).on_duplicate("name", "A supplier group with this name already exists")
        })?;

        audit.record("supplier_group", group.id, AuditAction::Created);
        Ok(group)
    }

    pub async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, plate_number, description, is_active, created_at
            FROM vehicles
            ORDER BY plate_number
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(vehicles)
    }

    pub async fn create_vehicle(
        &self,
        audit: &AuditContext,
        input: CreateVehicleInput,
    ) -> AppResult<Vehicle> {
        validate_plate_number(&input.plate_number)
            .map_err(|msg| AppError::validation("plateNumber", msg))?;

        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (plate_number, description)
            VALUES ($1, $2)
            RETURNING id, plate_number, description, is_active, created_at
            "#,
        )
        .bind(normalize_plate_number(&input.plate_number))
        .bind(&input.description)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            AppError::from(e).on_duplicate("plateNumber", "A vehicle with this plate already exists")
        })?;

        audit.record("vehicle", vehicle.id, AuditAction::Created);
        Ok(vehicle)
    }

    /// Contracts, optionally for one partner, newest first
    pub async fn list_contracts(&self, filter: ContractFilter) -> AppResult<Vec<Contract>> {
        let contracts = sqlx::query_as::<_, Contract>(
            r#"
            SELECT id, partner_id, contract_number, start_date, end_date, price_per_liter, created_at
            FROM contracts
            WHERE ($1::uuid IS NULL OR partner_id = $1)
            ORDER BY start_date DESC NULLS LAST, contract_number
            "#,
        )
        .bind(filter.partner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(contracts)
    }
}
