//! Production batch service
//!
//! Step transitions are decided by `shared::BatchPosition`; this service only
//! loads the batch, applies the outcome and persists it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{
    deviation_alert, evaluate_step, has_deviation_alert, is_temperature_deviation,
    step_target_temperature, BatchPosition, BatchStatus, ProductionStep, StepAction,
    StepHistoryEntry, StepStatus,
};

const BATCH_COLUMNS: &str = r#"
    id, batch_number, product_name, steps, current_step, status, target_temperature,
    current_temperature, current_ph, agitator_rpm, alerts, step_history, started_at,
    completed_at, created_at, updated_at
"#;

/// Production service for managing batches and their readings
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
}

/// Database row for a production batch
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    batch_number: String,
    product_name: String,
    steps: Json<Vec<ProductionStep>>,
    current_step: i32,
    status: String,
    target_temperature: Decimal,
    current_temperature: Option<Decimal>,
    current_ph: Option<Decimal>,
    agitator_rpm: Option<i32>,
    alerts: Json<Vec<String>>,
    step_history: Json<Vec<StepHistoryEntry>>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for ProductionBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(format!("invalid status '{}' in production_batches", row.status))
        })?;

        Ok(ProductionBatch {
            id: row.id,
            batch_number: row.batch_number,
            product_name: row.product_name,
            steps: row.steps.0,
            current_step: row.current_step.max(0) as usize,
            status,
            target_temperature: row.target_temperature,
            current_temperature: row.current_temperature,
            current_ph: row.current_ph,
            agitator_rpm: row.agitator_rpm,
            alerts: row.alerts.0,
            step_history: row.step_history.0,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Production batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionBatch {
    pub id: Uuid,
    pub batch_number: String,
    pub product_name: String,
    pub steps: Vec<ProductionStep>,
    pub current_step: usize,
    pub status: BatchStatus,
    pub target_temperature: Decimal,
    pub current_temperature: Option<Decimal>,
    pub current_ph: Option<Decimal>,
    pub agitator_rpm: Option<i32>,
    pub alerts: Vec<String>,
    pub step_history: Vec<StepHistoryEntry>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionBatch {
    fn position(&self) -> BatchPosition {
        BatchPosition::new(self.status, self.current_step)
    }

    fn current_step_label(&self) -> &str {
        self.steps
            .get(self.current_step)
            .map(|s| s.label.as_str())
            .unwrap_or_default()
    }

    /// Minutes spent on the current step: since the previous step finished,
    /// or since the batch started for the first step.
    fn elapsed_on_current_step(&self, now: DateTime<Utc>) -> i32 {
        let since = self
            .step_history
            .last()
            .map(|h| h.finished_at)
            .unwrap_or(self.started_at);
        (now - since).num_minutes().clamp(0, i32::MAX as i64) as i32
    }

    /// History entry for a finished step. Reported minutes win over the
    /// time measured since the previous step.
    fn finished_step_entry(
        &self,
        step: usize,
        reported_minutes: Option<i32>,
        now: DateTime<Utc>,
    ) -> StepHistoryEntry {
        StepHistoryEntry {
            step_label: self
                .steps
                .get(step)
                .map(|s| s.label.clone())
                .unwrap_or_default(),
            elapsed_minutes: Some(
                reported_minutes.unwrap_or_else(|| self.elapsed_on_current_step(now)),
            ),
            finished_at: now,
        }
    }
}

/// A logged manual reading
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BatchReading {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub step_label: String,
    pub temperature: Decimal,
    pub ph: Option<Decimal>,
    pub status: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Input for creating a batch
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchInput {
    #[validate(length(min = 1, max = 50, message = "Batch number is required"))]
    pub batch_number: String,
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub product_name: String,
    #[validate(length(min = 1, message = "At least one step is required"))]
    pub steps: Vec<ProductionStep>,
    pub target_temperature: Decimal,
}

/// Input for a step action
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StepActionInput {
    pub action: StepAction,
    /// Minutes the operator reports for the step being finished
    #[validate(range(min = 0, message = "Elapsed minutes cannot be negative"))]
    pub elapsed_minutes: Option<i32>,
}

/// Input for a manual parameter update
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParamsInput {
    pub temperature: Decimal,
    pub ph: Option<Decimal>,
    pub agitator_rpm: Option<i32>,
    pub note: Option<String>,
}

/// Filters for the batch list
#[derive(Debug, Default, Deserialize)]
pub struct BatchFilter {
    pub status: Option<BatchStatus>,
}

impl ProductionService {
    /// Create a new ProductionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List batches, most recently started first
    pub async fn list(&self, filter: BatchFilter) -> AppResult<Vec<ProductionBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {} FROM production_batches
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY started_at DESC
            "#,
            BATCH_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ProductionBatch::try_from).collect()
    }

    /// Get batch by ID
    pub async fn get(&self, id: Uuid) -> AppResult<ProductionBatch> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM production_batches WHERE id = $1",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?;

        row.try_into()
    }

    /// Start a new batch on its first step
    pub async fn create(
        &self,
        audit: &AuditContext,
        input: CreateBatchInput,
    ) -> AppResult<ProductionBatch> {
        input.validate()?;

        if let Some(i) = input.steps.iter().position(|s| s.label.trim().is_empty()) {
            return Err(AppError::validation(
                "steps",
                format!("Step {} has no label", i + 1),
            ));
        }

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            INSERT INTO production_batches (batch_number, product_name, steps, status, target_temperature)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(input.batch_number.trim())
        .bind(input.product_name.trim())
        .bind(Json(&input.steps))
        .bind(BatchStatus::Running.as_str())
        .bind(input.target_temperature)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            AppError::from(e).on_duplicate(
                "batchNumber",
                format!("Batch {} already exists", input.batch_number.trim()),
            )
        })?;

        let batch = ProductionBatch::try_from(row)?;
        audit.record("production_batch", batch.id, AuditAction::Created);
        Ok(batch)
    }

    /// Apply an operator action to the step workflow
    pub async fn apply_step(
        &self,
        audit: &AuditContext,
        id: Uuid,
        input: StepActionInput,
    ) -> AppResult<ProductionBatch> {
        input.validate()?;
        let mut tx = self.db.begin().await?;

        let batch: ProductionBatch = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM production_batches WHERE id = $1 FOR UPDATE",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?
        .try_into()?;

        let transition = batch.position().apply(input.action, batch.steps.len())?;
        let now = Utc::now();

        let mut history = batch.step_history.clone();
        if let Some(finished) = transition.finished_step {
            history.push(batch.finished_step_entry(finished, input.elapsed_minutes, now));
        }

        let completed_at = match transition.position.status {
            BatchStatus::Completed => Some(now),
            _ => None,
        };

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            UPDATE production_batches
            SET current_step = $1, status = $2, step_history = $3,
                completed_at = COALESCE($4, completed_at)
            WHERE id = $5
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(transition.position.current_step as i32)
        .bind(transition.position.status.as_str())
        .bind(Json(&history))
        .bind(completed_at)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let updated = ProductionBatch::try_from(row)?;
        audit.record_with(
            "production_batch",
            id,
            AuditAction::StepChanged,
            &format!(
                "{:?}: step {} {} -> step {} {}",
                input.action,
                batch.current_step,
                batch.status.as_str(),
                updated.current_step,
                updated.status.as_str()
            ),
        );
        Ok(updated)
    }

    /// Store a manual reading, log it, and raise a deviation alert when the
    /// temperature is off target
    pub async fn update_params(
        &self,
        audit: &AuditContext,
        id: Uuid,
        input: UpdateParamsInput,
    ) -> AppResult<ProductionBatch> {
        if let Some(ph) = input.ph {
            shared::validate_ph(ph).map_err(|msg| AppError::validation("ph", msg))?;
        }
        if input.agitator_rpm.is_some_and(|rpm| rpm < 0) {
            return Err(AppError::validation(
                "agitatorRpm",
                "Agitator speed cannot be negative",
            ));
        }

        let mut tx = self.db.begin().await?;

        let batch: ProductionBatch = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM production_batches WHERE id = $1 FOR UPDATE",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production batch".to_string()))?
        .try_into()?;

        if batch.status == BatchStatus::Completed {
            return Err(AppError::validation(
                "status",
                "Parameters cannot be recorded on a completed batch",
            ));
        }

        let step_label = batch.current_step_label().to_string();
        let step_status: StepStatus = evaluate_step(&step_label, input.temperature);
        let target =
            step_target_temperature(&batch.steps, batch.current_step, batch.target_temperature);

        let mut alerts = batch.alerts.clone();
        let mut status = batch.status;
        let mut raised = None;
        if is_temperature_deviation(target, input.temperature) {
            status = BatchStatus::Issue;
            if !has_deviation_alert(&alerts) {
                let alert = deviation_alert(target, input.temperature);
                raised = Some(alert.clone());
                alerts.push(alert);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO production_batch_readings (batch_id, step_label, temperature, ph, status, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&step_label)
        .bind(input.temperature)
        .bind(input.ph)
        .bind(step_status.as_str())
        .bind(&input.note)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            UPDATE production_batches
            SET current_temperature = $1, current_ph = COALESCE($2, current_ph),
                agitator_rpm = COALESCE($3, agitator_rpm), alerts = $4, status = $5
            WHERE id = $6
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(input.temperature)
        .bind(input.ph)
        .bind(input.agitator_rpm)
        .bind(Json(&alerts))
        .bind(status.as_str())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        audit.record_with(
            "production_batch",
            id,
            AuditAction::ReadingRecorded,
            step_status.as_str(),
        );
        if let Some(alert) = raised {
            tracing::warn!(batch_id = %id, step = %step_label, %alert, "temperature deviation");
            audit.record_with("production_batch", id, AuditAction::AlertRaised, &alert);
        }

        row.try_into()
    }

    /// Reading log of a batch, oldest first
    pub async fn list_readings(&self, id: Uuid) -> AppResult<Vec<BatchReading>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM production_batches WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Production batch".to_string()));
        }

        let readings = sqlx::query_as::<_, BatchReading>(
            r#"
            SELECT id, batch_id, step_label, temperature, ph, status, note, recorded_at
            FROM production_batch_readings
            WHERE batch_id = $1
            ORDER BY recorded_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(readings)
    }
}
