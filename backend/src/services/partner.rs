//! Partner (supplier/customer) service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{normalize_tax_number, PartnerType};

const PARTNER_COLUMNS: &str = r#"
    id, name, tax_number, partner_type, supplier_group_id, phone, address, is_active, created_at
"#;

/// Partner service
#[derive(Clone)]
pub struct PartnerService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct PartnerRow {
    id: Uuid,
    name: String,
    tax_number: Option<String>,
    partner_type: String,
    supplier_group_id: Option<Uuid>,
    phone: Option<String>,
    address: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PartnerRow> for Partner {
    type Error = AppError;

    fn try_from(row: PartnerRow) -> Result<Self, Self::Error> {
        let partner_type = PartnerType::from_str(&row.partner_type).ok_or_else(|| {
            AppError::Internal(format!("invalid partner_type '{}'", row.partner_type))
        })?;

        Ok(Partner {
            id: row.id,
            name: row.name,
            tax_number: row.tax_number,
            partner_type,
            supplier_group_id: row.supplier_group_id,
            phone: row.phone,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Partner
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub tax_number: Option<String>,
    pub partner_type: PartnerType,
    pub supplier_group_id: Option<Uuid>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or updating a partner
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 30, message = "Tax number is too long"))]
    pub tax_number: Option<String>,
    #[serde(default)]
    pub partner_type: PartnerType,
    pub supplier_group_id: Option<Uuid>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Filters for the partner list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerFilter {
    pub search_term: Option<String>,
    #[serde(rename = "type")]
    pub partner_type: Option<PartnerType>,
    pub supplier_group_id: Option<Uuid>,
}

impl PartnerService {
    /// Create a new PartnerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List partners by name
    pub async fn list(&self, filter: PartnerFilter) -> AppResult<Vec<Partner>> {
        let search = filter
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let rows = sqlx::query_as::<_, PartnerRow>(&format!(
            r#"
            SELECT {} FROM partners
            WHERE ($1::text IS NULL OR name ILIKE $1 OR tax_number ILIKE $1)
              AND ($2::text IS NULL OR partner_type = $2)
              AND ($3::uuid IS NULL OR supplier_group_id = $3)
            ORDER BY name
            "#,
            PARTNER_COLUMNS
        ))
        .bind(&search)
        .bind(filter.partner_type.map(|t| t.as_str()))
        .bind(filter.supplier_group_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Partner::try_from).collect()
    }

    /// Get partner by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Partner> {
        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            "SELECT {} FROM partners WHERE id = $1",
            PARTNER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Partner".to_string()))?;

        row.try_into()
    }

    /// Create a partner
    pub async fn create(&self, audit: &AuditContext, input: PartnerInput) -> AppResult<Partner> {
        input.validate()?;
        self.ensure_supplier_group(input.supplier_group_id).await?;

        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            r#"
            INSERT INTO partners (name, tax_number, partner_type, supplier_group_id, phone, address, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(normalize_tax_number(input.tax_number.as_deref()))
        .bind(input.partner_type.as_str())
        .bind(input.supplier_group_id)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(duplicate_tax_number)?;

        let partner = Partner::try_from(row)?;
        audit.record("partner", partner.id, AuditAction::Created);
        Ok(partner)
    }

    /// Update a partner
    pub async fn update(
        &self,
        audit: &AuditContext,
        id: Uuid,
        input: PartnerInput,
    ) -> AppResult<Partner> {
        input.validate()?;
        self.ensure_supplier_group(input.supplier_group_id).await?;

        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            r#"
            UPDATE partners
            SET name = $1, tax_number = $2, partner_type = $3, supplier_group_id = $4,
                phone = $5, address = $6, is_active = $7
            WHERE id = $8
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(normalize_tax_number(input.tax_number.as_deref()))
        .bind(input.partner_type.as_str())
        .bind(input.supplier_group_id)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.is_active)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(duplicate_tax_number)?
        .ok_or_else(|| AppError::NotFound("Partner".to_string()))?;

        let partner = Partner::try_from(row)?;
        audit.record("partner", partner.id, AuditAction::Updated);
        Ok(partner)
    }

    async fn ensure_supplier_group(&self, id: Option<Uuid>) -> AppResult<()> {
        let Some(id) = id else {
            return Ok(());
        };

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM supplier_groups WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound("Supplier group".to_string()))
        }
    }
}

fn duplicate_tax_number(err: sqlx::Error) -> AppError {
    AppError::from(err).on_duplicate("taxNumber", "A partner with this tax number already exists")
}
