//! Partner CSV import
//!
//! The file is parsed completely, reconciled with `shared::plan_partner_import`
//! and written in one transaction. A malformed cell rejects the whole file.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{
    plan_partner_import, ImportPlan, ImportRow, MatchKind, MatchPolicy, PartnerKey, PartnerRef,
    PartnerType, RowDecision,
};

/// Partner import service
#[derive(Clone)]
pub struct PartnerImportService {
    db: PgPool,
    policy: MatchPolicy,
}

/// One CSV record as written by the spreadsheet export
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRecord {
    name: String,
    #[serde(default)]
    tax_number: Option<String>,
    #[serde(default)]
    contract_number: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    price_per_liter: Option<String>,
}

/// How a single row was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowOutcome {
    Created,
    Matched,
    Conflict,
    Skipped,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowReport {
    pub line: usize,
    pub outcome: RowOutcome,
    pub partner_id: Option<Uuid>,
    pub matched_by: Option<MatchKind>,
    pub contract_id: Option<Uuid>,
    pub message: Option<String>,
}

/// Result of an import
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub policy: MatchPolicy,
    pub created_partners: usize,
    pub matched_partners: usize,
    pub created_contracts: usize,
    pub conflicts: usize,
    pub skipped: usize,
    pub rows: Vec<ImportRowReport>,
}

#[derive(Debug, sqlx::FromRow)]
struct PartnerKeyRow {
    id: Uuid,
    name: String,
    tax_number: Option<String>,
}

impl PartnerImportService {
    /// Create a new PartnerImportService with the configured match policy
    pub fn new(db: PgPool, policy: MatchPolicy) -> Self {
        Self { db, policy }
    }

    /// Import partners and contracts from CSV text
    pub async fn import_csv(&self, audit: &AuditContext, body: &str) -> AppResult<ImportReport> {
        let rows = parse_csv(body)?;
        if rows.is_empty() {
            return Err(AppError::ValidationError(
                "The file contains no data rows".to_string(),
            ));
        }

        let existing: Vec<PartnerKey> = sqlx::query_as::<_, PartnerKeyRow>(
            "SELECT id, name, tax_number FROM partners",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|r| PartnerKey {
            id: r.id,
            name: r.name,
            tax_number: r.tax_number,
        })
        .collect();

        let existing_contracts: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT contract_number FROM contracts")
                .fetch_all(&self.db)
                .await?
                .into_iter()
                .collect();

        let plan = plan_partner_import(&existing, &existing_contracts, rows, self.policy);
        let report = self.apply(&plan).await?;

        tracing::info!(
            created = report.created_partners,
            matched = report.matched_partners,
            contracts = report.created_contracts,
            conflicts = report.conflicts,
            skipped = report.skipped,
            "partner import applied"
        );
        audit.record_with(
            "partner_import",
            audit.actor(),
            AuditAction::Imported,
            &format!(
                "{} created, {} contracts",
                report.created_partners, report.created_contracts
            ),
        );

        Ok(report)
    }

    /// Write the plan in one transaction and build the report
    async fn apply(&self, plan: &ImportPlan) -> AppResult<ImportReport> {
        let mut tx = self.db.begin().await?;

        let mut new_ids = Vec::with_capacity(plan.new_partners.len());
        for partner in &plan.new_partners {
            let id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO partners (name, tax_number, partner_type)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(&partner.name)
            .bind(&partner.tax_number)
            .bind(PartnerType::Supplier.as_str())
            .fetch_one(&mut *tx)
            .await?;
            new_ids.push(id);
        }

        let resolve = |r: PartnerRef| -> AppResult<Uuid> {
            match r {
                PartnerRef::Existing(id) => Ok(id),
                PartnerRef::New(i) => new_ids.get(i).copied().ok_or_else(|| {
                    AppError::Internal(format!("import plan references unknown partner {}", i))
                }),
            }
        };

        let mut report = ImportReport {
            policy: self.policy,
            created_partners: plan.new_partners.len(),
            matched_partners: 0,
            created_contracts: 0,
            conflicts: plan.conflicts(),
            skipped: 0,
            rows: Vec::with_capacity(plan.rows.len()),
        };

        for row in &plan.rows {
            let (outcome, partner_id, matched_by, mut message) = match &row.decision {
                RowDecision::Created { partner } => {
                    (RowOutcome::Created, Some(resolve(*partner)?), None, None)
                }
                RowDecision::Matched { partner, by } => {
                    report.matched_partners += 1;
                    (RowOutcome::Matched, Some(resolve(*partner)?), Some(*by), None)
                }
                RowDecision::Conflict {
                    tax_match,
                    name_match,
                } => (
                    RowOutcome::Conflict,
                    None,
                    None,
                    Some(format!(
                        "tax number matches partner {} but name matches partner {}",
                        resolve(*tax_match)?,
                        resolve(*name_match)?
                    )),
                ),
                RowDecision::Skipped { reason } => {
                    report.skipped += 1;
                    (RowOutcome::Skipped, None, None, Some(reason.clone()))
                }
            };

            let contract_id = match &row.contract {
                Some(contract) => {
                    let id = sqlx::query_scalar::<_, Uuid>(
                        r#"
                        INSERT INTO contracts (partner_id, contract_number, start_date, end_date, price_per_liter)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING id
                        "#,
                    )
                    .bind(resolve(contract.partner)?)
                    .bind(&contract.contract_number)
                    .bind(contract.start_date)
                    .bind(contract.end_date)
                    .bind(contract.price_per_liter)
                    .fetch_one(&mut *tx)
                    .await?;
                    report.created_contracts += 1;
                    Some(id)
                }
                None => None,
            };

            if message.is_none() {
                message = row.contract_note.clone();
            }

            report.rows.push(ImportRowReport {
                line: row.line,
                outcome,
                partner_id,
                matched_by,
                contract_id,
                message,
            });
        }

        tx.commit().await?;
        Ok(report)
    }
}

/// Parse the CSV body into import rows
fn parse_csv(body: &str) -> AppResult<Vec<ImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<CsvRecord>().enumerate() {
        let line = i + 1;
        let record = record.map_err(|e| {
            AppError::validation(format!("line {}", line), format!("Unreadable row: {}", e))
        })?;

        let start_date = parse_date(line, "startDate", record.start_date.as_deref())?;
        let end_date = parse_date(line, "endDate", record.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(AppError::validation(
                    format!("line {}", line),
                    "endDate is before startDate",
                ));
            }
        }

        let price_per_liter = match non_empty(record.price_per_liter.as_deref()) {
            Some(raw) => Some(Decimal::from_str(raw).map_err(|_| {
                AppError::validation(
                    format!("line {}", line),
                    format!("pricePerLiter '{}' is not a number", raw),
                )
            })?),
            None => None,
        };

        rows.push(ImportRow {
            line,
            name: record.name,
            tax_number: non_empty(record.tax_number.as_deref()).map(str::to_string),
            contract_number: non_empty(record.contract_number.as_deref()).map(str::to_string),
            start_date,
            end_date,
            price_per_liter,
        });
    }

    Ok(rows)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(line: usize, column: &str, raw: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match non_empty(raw) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Some).map_err(|_| {
            AppError::validation(
                format!("line {}", line),
                format!("{} '{}' is not a yyyy-MM-dd date", column, s),
            )
        }),
    }
}
