//! Milk collection entry service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{
    resolve_collected_at, validate_percentage, validate_ph, validate_quantity, AntibioticResult,
    CollectionStatus, PartnerType, RecordState,
};

const COLLECTION_COLUMNS: &str = r#"
    c.id, c.collected_at, c.supplier_id, p.name AS supplier_name, c.vehicle_id, c.vehicle_plate,
    c.quantity_liters, c.fat, c.protein, c.temperature, c.ph, c.antibiotic, c.sample_id, c.status,
    c.inspector, c.notes, c.created_at, c.updated_at
"#;

/// Milk collection service
#[derive(Clone)]
pub struct MilkCollectionService {
    db: PgPool,
}

/// Database row for a collection entry joined with its supplier
#[derive(Debug, sqlx::FromRow)]
struct CollectionRow {
    id: Uuid,
    collected_at: DateTime<Utc>,
    supplier_id: Uuid,
    supplier_name: String,
    vehicle_id: Option<Uuid>,
    vehicle_plate: Option<String>,
    quantity_liters: Decimal,
    fat: Option<Decimal>,
    protein: Option<Decimal>,
    temperature: Option<Decimal>,
    ph: Option<Decimal>,
    antibiotic: Option<String>,
    sample_id: Option<String>,
    status: String,
    inspector: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CollectionRow> for MilkCollection {
    type Error = AppError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        let status = CollectionStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(format!("invalid status '{}' in milk_collections", row.status))
        })?;
        let antibiotic = match row.antibiotic.as_deref() {
            Some(v) => Some(AntibioticResult::from_str(v).ok_or_else(|| {
                AppError::Internal(format!("invalid antibiotic '{}' in milk_collections", v))
            })?),
            None => None,
        };

        Ok(MilkCollection {
            id: row.id,
            collected_at: row.collected_at,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            vehicle_id: row.vehicle_id,
            vehicle_plate: row.vehicle_plate,
            quantity_liters: row.quantity_liters,
            fat: row.fat,
            protein: row.protein,
            temperature: row.temperature,
            ph: row.ph,
            antibiotic,
            sample_id: row.sample_id,
            status,
            inspector: row.inspector,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A milk delivery from a supplier
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkCollection {
    pub id: Uuid,
    pub collected_at: DateTime<Utc>,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub vehicle_id: Option<Uuid>,
    pub vehicle_plate: Option<String>,
    pub quantity_liters: Decimal,
    pub fat: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub temperature: Option<Decimal>,
    pub ph: Option<Decimal>,
    pub antibiotic: Option<AntibioticResult>,
    pub sample_id: Option<String>,
    pub status: CollectionStatus,
    pub inspector: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording or updating a delivery
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInput {
    /// Timestamp as sent by the client; absent or unparseable means now
    pub collected_at: Option<String>,
    pub supplier_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub vehicle_plate: Option<String>,
    pub quantity_liters: Decimal,
    pub fat: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub temperature: Option<Decimal>,
    pub ph: Option<Decimal>,
    pub antibiotic: Option<AntibioticResult>,
    pub sample_id: Option<String>,
    #[serde(default)]
    pub status: CollectionStatus,
    pub inspector: Option<String>,
    pub notes: Option<String>,
}

/// Filters for the collection list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionFilter {
    /// Calendar day (UTC)
    pub date: Option<NaiveDate>,
    pub search_term: Option<String>,
}

/// Input after lookups and defaults have been resolved
struct ResolvedCollection {
    collected_at: DateTime<Utc>,
    vehicle_plate: Option<String>,
}

impl MilkCollectionService {
    /// Create a new MilkCollectionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List active deliveries, newest first
    pub async fn list(&self, filter: CollectionFilter) -> AppResult<Vec<MilkCollection>> {
        let day_start = filter
            .date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc());
        let day_end = filter
            .date
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc());
        let search = filter
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let rows = sqlx::query_as::<_, CollectionRow>(&format!(
            r#"
            SELECT {}
            FROM milk_collections c
            JOIN partners p ON p.id = c.supplier_id
            WHERE c.record_state = $1
              AND ($2::timestamptz IS NULL OR c.collected_at >= $2)
              AND ($3::timestamptz IS NULL OR c.collected_at < $3)
              AND ($4::text IS NULL OR p.name ILIKE $4 OR c.vehicle_plate ILIKE $4 OR c.sample_id ILIKE $4)
            ORDER BY c.collected_at DESC
            "#,
            COLLECTION_COLUMNS
        ))
        .bind(RecordState::Active.as_str())
        .bind(day_start)
        .bind(day_end)
        .bind(&search)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(MilkCollection::try_from).collect()
    }

    /// Get an active delivery by ID
    pub async fn get(&self, id: Uuid) -> AppResult<MilkCollection> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            r#"
            SELECT {}
            FROM milk_collections c
            JOIN partners p ON p.id = c.supplier_id
            WHERE c.id = $1 AND c.record_state = $2
            "#,
            COLLECTION_COLUMNS
        ))
        .bind(id)
        .bind(RecordState::Active.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Milk collection".to_string()))?;

        row.try_into()
    }

    /// Record a delivery
    pub async fn create(
        &self,
        audit: &AuditContext,
        input: CollectionInput,
    ) -> AppResult<MilkCollection> {
        let resolved = self.resolve(&input).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO milk_collections (collected_at, supplier_id, vehicle_id, vehicle_plate,
                                          quantity_liters, fat, protein, temperature, ph, antibiotic,
                                          sample_id, status, inspector, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(resolved.collected_at)
        .bind(input.supplier_id)
        .bind(input.vehicle_id)
        .bind(&resolved.vehicle_plate)
        .bind(input.quantity_liters)
        .bind(input.fat)
        .bind(input.protein)
        .bind(input.temperature)
        .bind(input.ph)
        .bind(input.antibiotic.map(|a| a.as_str()))
        .bind(&input.sample_id)
        .bind(input.status.as_str())
        .bind(&input.inspector)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        audit.record_with(
            "milk_collection",
            id,
            AuditAction::Created,
            &format!("{} L", input.quantity_liters),
        );
        self.get(id).await
    }

    /// Update a delivery that has not been approved yet
    pub async fn update(
        &self,
        audit: &AuditContext,
        id: Uuid,
        input: CollectionInput,
    ) -> AppResult<MilkCollection> {
        let current = self.get(id).await?;
        if !current.status.is_mutable() {
            return Err(AppError::validation(
                "status",
                "Approved collections cannot be modified",
            ));
        }

        let resolved = self.resolve(&input).await?;

        let result = sqlx::query(
            r#"
            UPDATE milk_collections
            SET collected_at = $1, supplier_id = $2, vehicle_id = $3, vehicle_plate = $4,
                quantity_liters = $5, fat = $6, protein = $7, temperature = $8, ph = $9,
                antibiotic = $10, sample_id = $11, status = $12, inspector = $13, notes = $14
            WHERE id = $15 AND record_state = $16 AND status <> $17
            "#,
        )
        .bind(resolved.collected_at)
        .bind(input.supplier_id)
        .bind(input.vehicle_id)
        .bind(&resolved.vehicle_plate)
        .bind(input.quantity_liters)
        .bind(input.fat)
        .bind(input.protein)
        .bind(input.temperature)
        .bind(input.ph)
        .bind(input.antibiotic.map(|a| a.as_str()))
        .bind(&input.sample_id)
        .bind(input.status.as_str())
        .bind(&input.inspector)
        .bind(&input.notes)
        .bind(id)
        .bind(RecordState::Active.as_str())
        .bind(CollectionStatus::Approved.as_str())
        .execute(&self.db)
        .await?;

        // approved or deleted in between
        if result.rows_affected() == 0 {
            return Err(AppError::validation(
                "status",
                "Approved collections cannot be modified",
            ));
        }

        audit.record_with("milk_collection", id, AuditAction::Updated, input.status.as_str());
        self.get(id).await
    }

    /// Soft delete a delivery that has not been approved
    pub async fn delete(&self, audit: &AuditContext, id: Uuid) -> AppResult<()> {
        let current = self.get(id).await?;
        if !current.status.is_mutable() {
            return Err(AppError::validation(
                "status",
                "Approved collections cannot be deleted",
            ));
        }

        sqlx::query("UPDATE milk_collections SET record_state = $1 WHERE id = $2")
            .bind(RecordState::Deleted.as_str())
            .bind(id)
            .execute(&self.db)
            .await?;

        audit.record("milk_collection", id, AuditAction::Deleted);
        Ok(())
    }

    /// Validate the input, check references and fill in defaults
    async fn resolve(&self, input: &CollectionInput) -> AppResult<ResolvedCollection> {
        validate_quantity(input.quantity_liters)
            .map_err(|msg| AppError::validation("quantityLiters", msg))?;
        if let Some(fat) = input.fat {
            validate_percentage(fat).map_err(|msg| AppError::validation("fat", msg))?;
        }
        if let Some(protein) = input.protein {
            validate_percentage(protein).map_err(|msg| AppError::validation("protein", msg))?;
        }
        if let Some(ph) = input.ph {
            validate_ph(ph).map_err(|msg| AppError::validation("ph", msg))?;
        }

        let partner_type =
            sqlx::query_scalar::<_, String>("SELECT partner_type FROM partners WHERE id = $1")
                .bind(input.supplier_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        if !PartnerType::from_str(&partner_type).is_some_and(|t| t.supplies_milk()) {
            return Err(AppError::validation(
                "supplierId",
                "Partner is not registered as a milk supplier",
            ));
        }

        let supplied_plate = input
            .vehicle_plate
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let vehicle_plate = match input.vehicle_id {
            Some(vehicle_id) => {
                let plate = sqlx::query_scalar::<_, String>(
                    "SELECT plate_number FROM vehicles WHERE id = $1",
                )
                .bind(vehicle_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Vehicle".to_string()))?;

                supplied_plate.or(Some(plate))
            }
            None => supplied_plate,
        };

        Ok(ResolvedCollection {
            collected_at: resolve_collected_at(input.collected_at.as_deref(), Utc::now()),
            vehicle_plate,
        })
    }
}
