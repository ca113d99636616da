//! Monthly collection summary (borderou) models and arithmetic

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a monthly summary row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryStatus {
    #[default]
    Draft,
    Finalized,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Draft => "DRAFT",
            SummaryStatus::Finalized => "FINALIZED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(SummaryStatus::Draft),
            "FINALIZED" => Some(SummaryStatus::Finalized),
            _ => None,
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, SummaryStatus::Draft)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid month '{0}', expected yyyy-MM")]
pub struct MonthParseError(pub String);

/// A calendar month, normalized to its first day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SummaryMonth(NaiveDate);

impl SummaryMonth {
    /// Parse strictly as `yyyy-MM`
    pub fn parse(raw: &str) -> Result<Self, MonthParseError> {
        let err = || MonthParseError(raw.to_string());
        let bytes = raw.as_bytes();

        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(err());
        }
        if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
            return Err(err());
        }

        let year: i32 = raw[..4].parse().map_err(|_| err())?;
        let month: u32 = raw[5..].parse().map_err(|_| err())?;

        NaiveDate::from_ymd_opt(year, month, 1)
            .map(SummaryMonth)
            .ok_or_else(err)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        // day 1 always exists
        SummaryMonth(date.with_day(1).unwrap_or(date))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// First day of the following month
    pub fn next_first_day(&self) -> NaiveDate {
        let (y, m) = if self.0.month() == 12 {
            (self.0.year() + 1, 1)
        } else {
            (self.0.year(), self.0.month() + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(self.0)
    }
}

impl std::fmt::Display for SummaryMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

/// One delivery's contribution to the monthly figures
#[derive(Debug, Clone, Copy)]
pub struct DeliveryFigures {
    pub quantity_liters: Decimal,
    pub fat: Option<Decimal>,
    pub protein: Option<Decimal>,
}

/// Computed monthly figures for one supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryFigures {
    pub total_liters: Decimal,
    pub average_fat: Decimal,
    pub average_protein: Decimal,
}

/// Aggregate deliveries into monthly figures.
///
/// Averages are weighted by quantity and only consider deliveries that carry
/// the measurement; they are zero when no delivery does. Results are rounded
/// to two decimals.
pub fn summarize_deliveries(deliveries: &[DeliveryFigures]) -> SummaryFigures {
    let total_liters: Decimal = deliveries.iter().map(|d| d.quantity_liters).sum();

    let weighted = |pick: fn(&DeliveryFigures) -> Option<Decimal>| {
        let (sum, weight) = deliveries
            .iter()
            .filter_map(|d| pick(d).map(|v| (v * d.quantity_liters, d.quantity_liters)))
            .fold((Decimal::ZERO, Decimal::ZERO), |(s, w), (v, q)| (s + v, w + q));

        if weight.is_zero() {
            Decimal::ZERO
        } else {
            (sum / weight).round_dp(2)
        }
    };

    SummaryFigures {
        total_liters: total_liters.round_dp(2),
        average_fat: weighted(|d| d.fat),
        average_protein: weighted(|d| d.protein),
    }
}

/// Collapse items for the same key to the last occurrence, keeping the
/// position of that last occurrence.
pub fn last_wins<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let k = key(&item);
        out.retain(|existing| key(existing) != k);
        out.push(item);
    }
    out
}

/// How a draft row lands on the stored summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftWrite {
    Insert,
    Overwrite,
}

/// A batch that touches rows which are already finalized
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{count} supplier(s) already have a finalized summary")]
pub struct FinalizedSummaries {
    pub count: usize,
}

/// Decide how each key of a batch is written given the status of the keys
/// that already have a row. Any finalized row rejects the whole batch.
pub fn plan_draft_writes<K>(
    stored: &HashMap<K, SummaryStatus>,
    keys: &[K],
) -> Result<Vec<(K, DraftWrite)>, FinalizedSummaries>
where
    K: Eq + Hash + Copy,
{
    let finalized = keys
        .iter()
        .filter(|k| stored.get(*k).is_some_and(|s| !s.is_editable()))
        .count();
    if finalized > 0 {
        return Err(FinalizedSummaries { count: finalized });
    }

    Ok(keys
        .iter()
        .map(|k| {
            let write = if stored.contains_key(k) {
                DraftWrite::Overwrite
            } else {
                DraftWrite::Insert
            };
            (*k, write)
        })
        .collect())
}

/// Rows a finalize turns from draft to finalized
pub fn rows_to_finalize<K: Copy>(stored: &[(K, SummaryStatus)]) -> Vec<K> {
    stored
        .iter()
        .filter(|(_, status)| status.is_editable())
        .map(|(k, _)| *k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn month_display_matches_input() {
        let m = SummaryMonth::parse("2024-02").unwrap();
        assert_eq!(m.to_string(), "2024-02");
        assert_eq!(m.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn december_rolls_over() {
        let m = SummaryMonth::parse("2023-12").unwrap();
        assert_eq!(m.next_first_day(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn from_date_normalizes_day() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        assert_eq!(SummaryMonth::from_date(d).to_string(), "2024-05");
    }

    proptest! {
        #[test]
        fn any_valid_month_parses(year in 1900i32..2200, month in 1u32..=12) {
            let raw = format!("{:04}-{:02}", year, month);
            let parsed = SummaryMonth::parse(&raw).unwrap();
            prop_assert_eq!(parsed.to_string(), raw);
            prop_assert_eq!(parsed.first_day().day(), 1);
        }

        #[test]
        fn weighted_average_stays_within_inputs(
            fats in prop::collection::vec((1u32..5000, 250u32..600), 1..20)
        ) {
            let deliveries: Vec<DeliveryFigures> = fats
                .iter()
                .map(|(q, f)| DeliveryFigures {
                    quantity_liters: Decimal::from(*q),
                    fat: Some(Decimal::new(i64::from(*f), 2)),
                    protein: None,
                })
                .collect();
            let figures = summarize_deliveries(&deliveries);
            let min = deliveries.iter().filter_map(|d| d.fat).min().unwrap();
            let max = deliveries.iter().filter_map(|d| d.fat).max().unwrap();
            prop_assert!(figures.average_fat >= min && figures.average_fat <= max);
            prop_assert_eq!(figures.average_protein, Decimal::ZERO);
        }
    }

    #[test]
    fn last_wins_keeps_final_item() {
        let items = vec![("a", 1), ("b", 2), ("a", 3)];
        let out = last_wins(items, |i| i.0);
        assert_eq!(out, vec![("b", 2), ("a", 3)]);
    }

    #[test]
    fn drafts_are_overwritten_and_new_keys_inserted() {
        let stored = HashMap::from([(1, SummaryStatus::Draft)]);
        let plan = plan_draft_writes(&stored, &[1, 2]).unwrap();
        assert_eq!(plan, vec![(1, DraftWrite::Overwrite), (2, DraftWrite::Insert)]);
    }

    #[test]
    fn finalized_rows_reject_the_batch() {
        let stored = HashMap::from([
            (1, SummaryStatus::Finalized),
            (2, SummaryStatus::Finalized),
            (3, SummaryStatus::Draft),
        ]);
        let err = plan_draft_writes(&stored, &[1, 3, 4]).unwrap_err();
        assert_eq!(err, FinalizedSummaries { count: 1 });
        assert_eq!(err.to_string(), "1 supplier(s) already have a finalized summary");
    }

    #[test]
    fn only_drafts_are_finalized() {
        let stored = [
            (1, SummaryStatus::Draft),
            (2, SummaryStatus::Finalized),
            (3, SummaryStatus::Draft),
        ];
        assert_eq!(rows_to_finalize(&stored), vec![1, 3]);
        assert!(rows_to_finalize(&[(1, SummaryStatus::Finalized)]).is_empty());
    }
}
