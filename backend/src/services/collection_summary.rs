//! Monthly collection summary service
//!
//! A summary row holds one supplier's monthly figures at one collection
//! point. Rows are saved as drafts in batches and then finalized; finalized
//! rows are never written again.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit::{AuditAction, AuditContext};
use shared::{
    last_wins, plan_draft_writes, rows_to_finalize, summarize_deliveries, validate_percentage,
    CollectionStatus, DeliveryFigures, DraftWrite, RecordState, SummaryFigures, SummaryMonth,
    SummaryStatus,
};

/// Collection summary service
#[derive(Clone)]
pub struct CollectionSummaryService {
    db: PgPool,
}

/// Database row for a summary joined with its supplier
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    month: NaiveDate,
    supplier_id: Uuid,
    supplier_name: String,
    collection_point_id: Uuid,
    total_liters: Decimal,
    average_fat: Decimal,
    average_protein: Decimal,
    status: String,
    finalized_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SummaryRow> for CollectionSummary {
    type Error = AppError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;

        Ok(CollectionSummary {
            id: row.id,
            month: SummaryMonth::from_date(row.month).to_string(),
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            collection_point_id: row.collection_point_id,
            figures: SummaryFigures {
                total_liters: row.total_liters,
                average_fat: row.average_fat,
                average_protein: row.average_protein,
            },
            status,
            finalized_at: row.finalized_at,
            updated_at: row.updated_at,
        })
    }
}

/// One supplier's monthly figures at a collection point
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub id: Uuid,
    pub month: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub collection_point_id: Uuid,
    #[serde(flatten)]
    pub figures: SummaryFigures,
    pub status: SummaryStatus,
    pub finalized_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Figures proposed from the month's deliveries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedSummary {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub deliveries: usize,
    #[serde(flatten)]
    pub figures: SummaryFigures,
}

/// Month and collection point selecting a set of summaries
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub month: String,
    pub collection_point_id: Uuid,
}

/// A draft row in a batch save
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryItem {
    pub supplier_id: Uuid,
    #[serde(flatten)]
    pub figures: SummaryFigures,
}

/// Input for a batch save
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBatchInput {
    pub month: String,
    pub collection_point_id: Uuid,
    pub items: Vec<SummaryItem>,
}

/// Outcome of a finalize request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResult {
    pub month: String,
    pub collection_point_id: Uuid,
    pub finalized: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    supplier_id: Uuid,
    supplier_name: String,
    status: String,
    quantity_liters: Decimal,
    fat: Option<Decimal>,
    protein: Option<Decimal>,
}

impl CollectionSummaryService {
    /// Create a new CollectionSummaryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Summaries of a month at a collection point, ordered by supplier name
    pub async fn list(&self, query: SummaryQuery) -> AppResult<Vec<CollectionSummary>> {
        let month = SummaryMonth::parse(&query.month)?;

        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT s.id, s.month, s.supplier_id, p.name AS supplier_name, s.collection_point_id,
                   s.total_liters, s.average_fat, s.average_protein, s.status, s.finalized_at,
                   s.updated_at
            FROM milk_collection_summaries s
            JOIN partners p ON p.id = s.supplier_id
            WHERE s.month = $1 AND s.collection_point_id = $2
            ORDER BY p.name, s.supplier_id
            "#,
        )
        .bind(month.first_day())
        .bind(query.collection_point_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(CollectionSummary::try_from).collect()
    }

    /// Propose figures for every supplier of the collection point that
    /// delivered in the month. Nothing is written.
    pub async fn aggregate(&self, query: SummaryQuery) -> AppResult<Vec<ProposedSummary>> {
        let month = SummaryMonth::parse(&query.month)?;
        if !self.collection_point_exists(query.collection_point_id).await? {
            return Err(AppError::NotFound("Collection point".to_string()));
        }

        let from = month.first_day().and_hms_opt(0, 0, 0).map(|d| d.and_utc());
        let to = month.next_first_day().and_hms_opt(0, 0, 0).map(|d| d.and_utc());

        let rows = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT c.supplier_id, p.name AS supplier_name, c.status, c.quantity_liters,
                   c.fat, c.protein
            FROM milk_collections c
            JOIN partners p ON p.id = c.supplier_id
            WHERE p.supplier_group_id = $1
              AND c.record_state = $2
              AND c.collected_at >= $3 AND c.collected_at < $4
            ORDER BY p.name, c.supplier_id, c.collected_at
            "#,
        )
        .bind(query.collection_point_id)
        .bind(RecordState::Active.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        let mut proposed: Vec<(Uuid, String, Vec<DeliveryFigures>)> = Vec::new();
        for row in rows {
            let counts = CollectionStatus::from_str(&row.status)
                .is_some_and(|s| s.counts_towards_summary());
            if !counts {
                continue;
            }

            let figures = DeliveryFigures {
                quantity_liters: row.quantity_liters,
                fat: row.fat,
                protein: row.protein,
            };
            // rows arrive grouped by supplier
            match proposed.last_mut() {
                Some((id, _, deliveries)) if *id == row.supplier_id => deliveries.push(figures),
                _ => proposed.push((row.supplier_id, row.supplier_name, vec![figures])),
            }
        }

        Ok(proposed
            .into_iter()
            .map(|(supplier_id, supplier_name, deliveries)| ProposedSummary {
                supplier_id,
                supplier_name,
                deliveries: deliveries.len(),
                figures: summarize_deliveries(&deliveries),
            })
            .collect())
    }

    /// Save draft rows for a month and collection point.
    ///
    /// Everything is validated before the first write and the rows are
    /// upserted in one transaction. An unknown collection point or supplier
    /// fails the batch as a validation error, and so does any supplier that
    /// already has a finalized row.
    pub async fn save_batch(
        &self,
        audit: &AuditContext,
        input: SaveBatchInput,
    ) -> AppResult<Vec<CollectionSummary>> {
        let month = SummaryMonth::parse(&input.month)?;
        if !self.collection_point_exists(input.collection_point_id).await? {
            return Err(AppError::validation(
                "collectionPointId",
                format!("Collection point {} does not exist", input.collection_point_id),
            ));
        }

        let items = last_wins(input.items, |item| item.supplier_id);
        for item in &items {
            validate_figures(&item.figures)?;
        }

        let supplier_ids: Vec<Uuid> = items.iter().map(|i| i.supplier_id).collect();
        let known: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM partners WHERE id = ANY($1)",
        )
        .bind(&supplier_ids)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();
        ensure_known_suppliers(&supplier_ids, &known)?;

        let mut tx = self.db.begin().await?;

        // lock every stored row of the batch so a concurrent finalize waits
        let stored: HashMap<Uuid, SummaryStatus> = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT supplier_id, status FROM milk_collection_summaries
            WHERE month = $1 AND collection_point_id = $2 AND supplier_id = ANY($3)
            FOR UPDATE
            "#,
        )
        .bind(month.first_day())
        .bind(input.collection_point_id)
        .bind(&supplier_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(supplier_id, status)| parse_status(&status).map(|s| (supplier_id, s)))
        .collect::<AppResult<_>>()?;

        let writes = plan_draft_writes(&stored, &supplier_ids)
            .map_err(|e| AppError::validation("items", format!("{} for {}", e, month)))?;

        for item in &items {
            let result = sqlx::query(
                r#"
                INSERT INTO milk_collection_summaries
                    (month, supplier_id, collection_point_id, total_liters, average_fat,
                     average_protein, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT ON CONSTRAINT uq_summary_month_supplier_point DO UPDATE
                SET total_liters = EXCLUDED.total_liters,
                    average_fat = EXCLUDED.average_fat,
                    average_protein = EXCLUDED.average_protein
                WHERE milk_collection_summaries.status = $7
                "#,
            )
            .bind(month.first_day())
            .bind(item.supplier_id)
            .bind(input.collection_point_id)
            .bind(item.figures.total_liters)
            .bind(item.figures.average_fat)
            .bind(item.figures.average_protein)
            .bind(SummaryStatus::Draft.as_str())
            .execute(&mut *tx)
            .await?;

            // a row finalized after the lock above was taken
            if result.rows_affected() == 0 {
                return Err(AppError::validation(
                    "items",
                    format!(
                        "Supplier {} already has a finalized summary for {}",
                        item.supplier_id, month
                    ),
                ));
            }
        }

        tx.commit().await?;

        let overwritten = writes
            .iter()
            .filter(|(_, w)| *w == DraftWrite::Overwrite)
            .count();
        audit.record_with(
            "collection_summary",
            format!("{}/{}", month, input.collection_point_id),
            AuditAction::DraftSaved,
            &format!(
                "{} inserted, {} overwritten",
                writes.len() - overwritten,
                overwritten
            ),
        );

        self.list(SummaryQuery {
            month: month.to_string(),
            collection_point_id: input.collection_point_id,
        })
        .await
    }

    /// Finalize the draft rows of a month and collection point. Rows that are
    /// already finalized keep their original timestamp.
    pub async fn finalize(
        &self,
        audit: &AuditContext,
        query: SummaryQuery,
    ) -> AppResult<FinalizeResult> {
        let month = SummaryMonth::parse(&query.month)?;
        if !self.collection_point_exists(query.collection_point_id).await? {
            return Err(AppError::NotFound("Collection point".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let stored: Vec<(Uuid, SummaryStatus)> = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT id, status FROM milk_collection_summaries
            WHERE month = $1 AND collection_point_id = $2
            FOR UPDATE
            "#,
        )
        .bind(month.first_day())
        .bind(query.collection_point_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, status)| parse_status(&status).map(|s| (id, s)))
        .collect::<AppResult<_>>()?;

        let drafts = rows_to_finalize(&stored);
        let finalized = if drafts.is_empty() {
            0
        } else {
            sqlx::query(
                r#"
                UPDATE milk_collection_summaries
                SET status = $1, finalized_at = NOW()
                WHERE id = ANY($2) AND status = $3
                "#,
            )
            .bind(SummaryStatus::Finalized.as_str())
            .bind(&drafts)
            .bind(SummaryStatus::Draft.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };

        tx.commit().await?;

        audit.record_with(
            "collection_summary",
            format!("{}/{}", month, query.collection_point_id),
            AuditAction::Finalized,
            &format!("{} rows", finalized),
        );

        Ok(FinalizeResult {
            month: month.to_string(),
            collection_point_id: query.collection_point_id,
            finalized,
        })
    }

    async fn collection_point_exists(&self, id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM supplier_groups WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }
}

fn parse_status(raw: &str) -> AppResult<SummaryStatus> {
    SummaryStatus::from_str(raw).ok_or_else(|| {
        AppError::Internal(format!(
            "invalid status '{}' in milk_collection_summaries",
            raw
        ))
    })
}

/// Every supplier of a batch must exist before anything is written
fn ensure_known_suppliers(supplier_ids: &[Uuid], known: &HashSet<Uuid>) -> AppResult<()> {
    match supplier_ids.iter().find(|id| !known.contains(id)) {
        Some(missing) => Err(AppError::validation(
            "items",
            format!("Supplier {} does not exist", missing),
        )),
        None => Ok(()),
    }
}

fn validate_figures(figures: &SummaryFigures) -> AppResult<()> {
    if figures.total_liters < Decimal::ZERO {
        return Err(AppError::validation(
            "totalLiters",
            "Total liters cannot be negative",
        ));
    }
    validate_percentage(figures.average_fat)
        .map_err(|msg| AppError::validation("averageFat", msg))?;
    validate_percentage(figures.average_protein)
        .map_err(|msg| AppError::validation("averageProtein", msg))?;
    Ok(())
}
