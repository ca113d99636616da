//! Laboratory test service
//!
//! The `result` column is never taken from the client: it is recomputed from
//! the measurements on every create and update.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{
    classify_lab_result, parse_timestamp, validate_measurements, AntibioticResult, LabMeasurements,
    LabResult, LabSample, LabStatus, PaginatedResponse, Pagination, RecordState, SampleType,
};

const LAB_TEST_COLUMNS: &str = r#"
    id, sample_id, collected_at, source_name, sample_type, fat, protein, ph, density, water,
    antibiotic, scc, cfu, status, result, inspector, notes, created_at, updated_at
"#;

/// Lab test service
#[derive(Clone)]
pub struct LabTestService {
    db: PgPool,
}

/// Database row for a lab test
#[derive(Debug, sqlx::FromRow)]
struct LabTestRow {
    id: Uuid,
    sample_id: String,
    collected_at: DateTime<Utc>,
    source_name: String,
    sample_type: String,
    fat: Option<Decimal>,
    protein: Option<Decimal>,
    ph: Option<Decimal>,
    density: Option<Decimal>,
    water: Option<Decimal>,
    antibiotic: Option<String>,
    scc: Option<i64>,
    cfu: Option<i64>,
    status: String,
    result: String,
    inspector: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LabTestRow> for LabSample {
    type Error = AppError;

    fn try_from(row: LabTestRow) -> Result<Self, Self::Error> {
        let corrupt = |column: &str, value: &str| {
            AppError::Internal(format!("invalid {} '{}' in lab_tests", column, value))
        };

        let antibiotic = match row.antibiotic.as_deref() {
            Some(v) => Some(AntibioticResult::from_str(v).ok_or_else(|| corrupt("antibiotic", v))?),
            None => None,
        };

        Ok(LabSample {
            id: row.id,
            sample_type: SampleType::from_str(&row.sample_type)
                .ok_or_else(|| corrupt("sample_type", &row.sample_type))?,
            status: LabStatus::from_str(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            result: LabResult::from_str(&row.result).ok_or_else(|| corrupt("result", &row.result))?,
            sample_id: row.sample_id,
            collected_at: row.collected_at,
            source_name: row.source_name,
            measurements: LabMeasurements {
                fat: row.fat,
                protein: row.protein,
                ph: row.ph,
                density: row.density,
                water: row.water,
                antibiotic,
                scc: row.scc,
                cfu: row.cfu,
            },
            inspector: row.inspector,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating or updating a lab test. A `result` sent by the client
/// is ignored.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LabTestInput {
    #[validate(length(min = 1, max = 50, message = "Sample id is required"))]
    pub sample_id: String,
    pub date: String,
    #[validate(length(min = 1, max = 200, message = "Source name is required"))]
    pub source_name: String,
    #[serde(rename = "type")]
    pub sample_type: SampleType,
    #[serde(flatten)]
    pub measurements: LabMeasurements,
    #[serde(default)]
    pub status: LabStatus,
    #[validate(length(min = 1, max = 100, message = "Inspector is required"))]
    pub inspector: String,
    pub notes: Option<String>,
}

/// Filters for the lab test list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestFilter {
    pub search_term: Option<String>,
    #[serde(rename = "type")]
    pub sample_type: Option<SampleType>,
    pub status: Option<LabStatus>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Validated input with the derived values filled in
struct PreparedLabTest {
    collected_at: DateTime<Utc>,
    result: LabResult,
}

impl LabTestService {
    /// Create a new LabTestService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List lab tests, newest first
    pub async fn list(&self, filter: LabTestFilter) -> AppResult<PaginatedResponse<LabSample>> {
        let pagination = Pagination::new(filter.page, filter.page_size);
        let date_from = parse_optional_date("dateFrom", filter.date_from.as_deref())?;
        let date_to = parse_date_to(filter.date_to.as_deref())?;
        let search = filter
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let sample_type = filter.sample_type.map(|t| t.as_str());
        let status = filter.status.map(|s| s.as_str());

        let where_clause = r#"
            WHERE record_state = $1
              AND ($2::text IS NULL OR sample_id ILIKE $2 OR source_name ILIKE $2 OR inspector ILIKE $2)
              AND ($3::text IS NULL OR sample_type = $3)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::timestamptz IS NULL OR collected_at >= $5)
              AND ($6::timestamptz IS NULL OR collected_at < $6)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM lab_tests {}",
            where_clause
        ))
        .bind(RecordState::Active.as_str())
        .bind(&search)
        .bind(sample_type)
        .bind(status)
        .bind(date_from)
        .bind(date_to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, LabTestRow>(&format!(
            "SELECT {} FROM lab_tests {} ORDER BY collected_at DESC, sample_id LIMIT $7 OFFSET $8",
            LAB_TEST_COLUMNS, where_clause
        ))
        .bind(RecordState::Active.as_str())
        .bind(&search)
        .bind(sample_type)
        .bind(status)
        .bind(date_from)
        .bind(date_to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(LabSample::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: pagination.meta(total.max(0) as u64),
        })
    }

    /// Get an active lab test by ID
    pub async fn get(&self, id: Uuid) -> AppResult<LabSample> {
        let row = sqlx::query_as::<_, LabTestRow>(&format!(
            "SELECT {} FROM lab_tests WHERE id = $1 AND record_state = $2",
            LAB_TEST_COLUMNS
        ))
        .bind(id)
        .bind(RecordState::Active.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lab test".to_string()))?;

        row.try_into()
    }

    /// Record a new lab test
    pub async fn create(&self, audit: &AuditContext, input: LabTestInput) -> AppResult<LabSample> {
        let prepared = prepare(&input)?;

        let row = sqlx::query_as::<_, LabTestRow>(&format!(
            r#"
            INSERT INTO lab_tests (sample_id, collected_at, source_name, sample_type, fat, protein,
                                   ph, density, water, antibiotic, scc, cfu, status, result,
                                   inspector, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            LAB_TEST_COLUMNS
        ))
        .bind(input.sample_id.trim())
        .bind(prepared.collected_at)
        .bind(input.source_name.trim())
        .bind(input.sample_type.as_str())
        .bind(input.measurements.fat)
        .bind(input.measurements.protein)
        .bind(input.measurements.ph)
        .bind(input.measurements.density)
        .bind(input.measurements.water)
        .bind(input.measurements.antibiotic.map(|a| a.as_str()))
        .bind(input.measurements.scc)
        .bind(input.measurements.cfu)
        .bind(input.status.as_str())
        .bind(prepared.result.as_str())
        .bind(input.inspector.trim())
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await
        .map_err(|e| duplicate_sample(e, &input.sample_id))?;

        let test = LabSample::try_from(row)?;
        audit.record_with("lab_test", test.id, AuditAction::Created, test.result.as_str());
        Ok(test)
    }

    /// Replace a lab test's fields and recompute its result
    pub async fn update(
        &self,
        audit: &AuditContext,
        id: Uuid,
        input: LabTestInput,
    ) -> AppResult<LabSample> {
        let prepared = prepare(&input)?;

        let row = sqlx::query_as::<_, LabTestRow>(&format!(
            r#"
            UPDATE lab_tests
            SET sample_id = $1, collected_at = $2, source_name = $3, sample_type = $4, fat = $5,
                protein = $6, ph = $7, density = $8, water = $9, antibiotic = $10, scc = $11,
                cfu = $12, status = $13, result = $14, inspector = $15, notes = $16
            WHERE id = $17 AND record_state = $18
            RETURNING {}
            "#,
            LAB_TEST_COLUMNS
        ))
        .bind(input.sample_id.trim())
        .bind(prepared.collected_at)
        .bind(input.source_name.trim())
        .bind(input.sample_type.as_str())
        .bind(input.measurements.fat)
        .bind(input.measurements.protein)
        .bind(input.measurements.ph)
        .bind(input.measurements.density)
        .bind(input.measurements.water)
        .bind(input.measurements.antibiotic.map(|a| a.as_str()))
        .bind(input.measurements.scc)
        .bind(input.measurements.cfu)
        .bind(input.status.as_str())
        .bind(prepared.result.as_str())
        .bind(input.inspector.trim())
        .bind(&input.notes)
        .bind(id)
        .bind(RecordState::Active.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| duplicate_sample(e, &input.sample_id))?
        .ok_or_else(|| AppError::NotFound("Lab test".to_string()))?;

        let test = LabSample::try_from(row)?;
        audit.record_with("lab_test", test.id, AuditAction::Updated, test.result.as_str());
        Ok(test)
    }

    /// Soft delete a lab test
    pub async fn delete(&self, audit: &AuditContext, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE lab_tests SET record_state = $1 WHERE id = $2 AND record_state = $3",
        )
        .bind(RecordState::Deleted.as_str())
        .bind(id)
        .bind(RecordState::Active.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Lab test".to_string()));
        }

        audit.record("lab_test", id, AuditAction::Deleted);
        Ok(())
    }
}

/// Validate input and derive the values the client cannot set
fn prepare(input: &LabTestInput) -> AppResult<PreparedLabTest> {
    input.validate()?;
    validate_measurements(&input.measurements)
        .map_err(|(field, message)| AppError::validation(field, message))?;

    let collected_at = parse_timestamp(&input.date)
        .ok_or_else(|| AppError::validation("date", "Date must be an ISO-8601 date or timestamp"))?;

    Ok(PreparedLabTest {
        collected_at,
        result: classify_lab_result(input.sample_type, &input.measurements),
    })
}

fn parse_optional_date(field: &str, raw: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| AppError::validation(field, format!("Invalid date '{}'", s))),
    }
}

/// Exclusive upper bound for `dateTo`. A bare date covers the whole day; a
/// timestamp stays inclusive at timestamptz resolution.
fn parse_date_to(raw: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(day
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|next| next.and_utc()));
    }

    parse_timestamp(s)
        .map(|ts| Some(ts + Duration::microseconds(1)))
        .ok_or_else(|| AppError::validation("dateTo", format!("Invalid date '{}'", s)))
}

fn duplicate_sample(err: sqlx::Error, sample_id: &str) -> AppError {
    AppError::from(err).on_duplicate(
        "sampleId",
        format!("Sample {} already exists", sample_id.trim()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bare_date_to_covers_whole_day() {
        let bound = parse_date_to(Some("2024-05-10")).unwrap().unwrap();
        assert_eq!(bound, Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap());

        let evening = Utc.with_ymd_and_hms(2024, 5, 10, 18, 45, 0).unwrap();
        assert!(evening < bound);
    }

    #[test]
    fn timestamp_date_to_stays_inclusive() {
        let exact = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let bound = parse_date_to(Some("2024-05-10T12:00:00Z")).unwrap().unwrap();
        assert!(exact < bound);
        assert!(exact + Duration::seconds(1) >= bound);
    }

    #[test]
    fn blank_or_invalid_date_to() {
        assert_eq!(parse_date_to(None).unwrap(), None);
        assert_eq!(parse_date_to(Some("  ")).unwrap(), None);
        assert!(matches!(
            parse_date_to(Some("tomorrow")),
            Err(AppError::Validation { ref field, .. }) if field == "dateTo"
        ));
    }
}
