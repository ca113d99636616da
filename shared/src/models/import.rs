//! Partner spreadsheet import: reconciliation of incoming rows against the
//! partners already on file
//!
//! Rows are matched by tax number first and by name (case-insensitive)
//! second. Rows that match nothing create a partner, and later rows of the
//! same import can match partners created by earlier ones. When a tax number
//! and a name point at two different partners the configured [`MatchPolicy`]
//! decides.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::partner::{normalize_name, normalize_tax_number, PartnerKey};

/// Tie-break when tax number and name identify different partners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPolicy {
    #[default]
    PreferTaxNumber,
    PreferName,
    Reject,
}

/// One parsed spreadsheet row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRow {
    /// 1-based line in the source file, header excluded
    pub line: usize,
    pub name: String,
    pub tax_number: Option<String>,
    pub contract_number: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub price_per_liter: Option<Decimal>,
}

/// Partner a row resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartnerRef {
    Existing(Uuid),
    /// Index into [`ImportPlan::new_partners`]
    New(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    TaxNumber,
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDecision {
    Matched { partner: PartnerRef, by: MatchKind },
    Created { partner: PartnerRef },
    Conflict { tax_match: PartnerRef, name_match: PartnerRef },
    Skipped { reason: String },
}

impl RowDecision {
    pub fn partner(&self) -> Option<PartnerRef> {
        match self {
            RowDecision::Matched { partner, .. } | RowDecision::Created { partner } => {
                Some(*partner)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPartner {
    pub name: String,
    pub tax_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedContract {
    pub partner: PartnerRef,
    pub contract_number: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub price_per_liter: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRow {
    pub line: usize,
    pub decision: RowDecision,
    pub contract: Option<PlannedContract>,
    /// Why a contract number on the row was not planned
    pub contract_note: Option<String>,
}

/// Everything an import would write, computed without touching storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPlan {
    pub new_partners: Vec<NewPartner>,
    pub rows: Vec<PlannedRow>,
}

impl ImportPlan {
    pub fn contracts(&self) -> impl Iterator<Item = &PlannedContract> {
        self.rows.iter().filter_map(|r| r.contract.as_ref())
    }

    pub fn conflicts(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.decision, RowDecision::Conflict { .. }))
            .count()
    }
}

/// Reconcile rows against existing partners and contract numbers
pub fn plan_partner_import(
    existing: &[PartnerKey],
    existing_contracts: &HashSet<String>,
    rows: Vec<ImportRow>,
    policy: MatchPolicy,
) -> ImportPlan {
    let mut by_tax: HashMap<String, PartnerRef> = HashMap::new();
    let mut by_name: HashMap<String, PartnerRef> = HashMap::new();

    for p in existing {
        let r = PartnerRef::Existing(p.id);
        if let Some(tax) = normalize_tax_number(p.tax_number.as_deref()) {
            by_tax.entry(tax).or_insert(r);
        }
        by_name.entry(normalize_name(&p.name)).or_insert(r);
    }

    let mut plan = ImportPlan::default();
    let mut seen_contracts: HashSet<String> = HashSet::new();

    for row in rows {
        let name = row.name.trim();
        if name.is_empty() {
            plan.rows.push(PlannedRow {
                line: row.line,
                decision: RowDecision::Skipped {
                    reason: "name is required".to_string(),
                },
                contract: None,
                contract_note: None,
            });
            continue;
        }

        let tax = normalize_tax_number(row.tax_number.as_deref());
        let name_key = normalize_name(name);
        let tax_hit = tax.as_ref().and_then(|t| by_tax.get(t)).copied();
        let name_hit = by_name.get(&name_key).copied();

        let decision = match (tax_hit, name_hit) {
            (Some(t), Some(n)) if t != n => match policy {
                MatchPolicy::PreferTaxNumber => RowDecision::Matched {
                    partner: t,
                    by: MatchKind::TaxNumber,
                },
                MatchPolicy::PreferName => RowDecision::Matched {
                    partner: n,
                    by: MatchKind::Name,
                },
                MatchPolicy::Reject => RowDecision::Conflict {
                    tax_match: t,
                    name_match: n,
                },
            },
            (Some(t), _) => RowDecision::Matched {
                partner: t,
                by: MatchKind::TaxNumber,
            },
            (None, Some(n)) => RowDecision::Matched {
                partner: n,
                by: MatchKind::Name,
            },
            (None, None) => {
                let r = PartnerRef::New(plan.new_partners.len());
                plan.new_partners.push(NewPartner {
                    name: name.to_string(),
                    tax_number: tax.clone(),
                });
                if let Some(t) = tax {
                    by_tax.insert(t, r);
                }
                by_name.insert(name_key, r);
                RowDecision::Created { partner: r }
            }
        };

        let (contract, contract_note) = match (decision.partner(), row.contract_number) {
            (_, None) => (None, None),
            (None, Some(_)) => (None, Some("row not imported".to_string())),
            (Some(partner), Some(number)) => {
                let number = number.trim().to_string();
                if number.is_empty() {
                    (None, None)
                } else if existing_contracts.contains(&number) {
                    (None, Some(format!("contract {} already exists", number)))
                } else if !seen_contracts.insert(number.clone()) {
                    (None, Some(format!("contract {} repeated in file", number)))
                } else {
                    (
                        Some(PlannedContract {
                            partner,
                            contract_number: number,
                            start_date: row.start_date,
                            end_date: row.end_date,
                            price_per_liter: row.price_per_liter,
                        }),
                        None,
                    )
                }
            }
        };

        plan.rows.push(PlannedRow {
            line: row.line,
            decision,
            contract,
            contract_note,
        });
    }

    plan
}
