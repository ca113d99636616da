//! Laboratory sample models and the lab result rule table

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lower bound of the acceptable raw milk density (g/ml)
pub const RAW_MILK_DENSITY_MIN: Decimal = Decimal::from_parts(1028, 0, 0, false, 3);
/// Upper bound of the acceptable raw milk density (g/ml)
pub const RAW_MILK_DENSITY_MAX: Decimal = Decimal::from_parts(1034, 0, 0, false, 3);
/// Raw milk below this pH is considered acidified
pub const RAW_MILK_PH_MIN: Decimal = Decimal::from_parts(60, 0, 0, false, 1);

/// A laboratory sample as persisted by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSample {
    pub id: Uuid,
    pub sample_id: String,
    #[serde(rename = "date")]
    pub collected_at: DateTime<Utc>,
    pub source_name: String,
    #[serde(rename = "type")]
    pub sample_type: SampleType,
    #[serde(flatten)]
    pub measurements: LabMeasurements,
    pub status: LabStatus,
    pub result: LabResult,
    pub inspector: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Measured values of a sample. Every field is optional; a missing value
/// never triggers a failing rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabMeasurements {
    pub fat: Option<Decimal>,
    pub protein: Option<Decimal>,
    pub ph: Option<Decimal>,
    pub density: Option<Decimal>,
    /// Added water (adulteration) percentage
    pub water: Option<Decimal>,
    pub antibiotic: Option<AntibioticResult>,
    /// Somatic cell count
    pub scc: Option<i64>,
    /// Colony forming units
    pub cfu: Option<i64>,
}

/// Kind of sample taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleType {
    RawMilk,
    WorkInProgress,
    FinishedGood,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::RawMilk => "RAW_MILK",
            SampleType::WorkInProgress => "WORK_IN_PROGRESS",
            SampleType::FinishedGood => "FINISHED_GOOD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RAW_MILK" => Some(SampleType::RawMilk),
            "WORK_IN_PROGRESS" => Some(SampleType::WorkInProgress),
            "FINISHED_GOOD" => Some(SampleType::FinishedGood),
            _ => None,
        }
    }
}

/// Antibiotic residue test outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AntibioticResult {
    Negative,
    Positive,
}

impl AntibioticResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AntibioticResult::Negative => "NEGATIVE",
            AntibioticResult::Positive => "POSITIVE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NEGATIVE" => Some(AntibioticResult::Negative),
            "POSITIVE" => Some(AntibioticResult::Positive),
            _ => None,
        }
    }
}

/// Workflow status of a lab test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabStatus {
    #[default]
    Pending,
    Completed,
}

impl LabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabStatus::Pending => "PENDING",
            LabStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(LabStatus::Pending),
            "COMPLETED" => Some(LabStatus::Completed),
            _ => None,
        }
    }
}

/// Verdict computed from the measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabResult {
    Pass,
    Fail,
    Warning,
}

impl LabResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabResult::Pass => "PASS",
            LabResult::Fail => "FAIL",
            LabResult::Warning => "WARNING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(LabResult::Pass),
            "FAIL" => Some(LabResult::Fail),
            "WARNING" => Some(LabResult::Warning),
            _ => None,
        }
    }
}

impl std::fmt::Display for LabResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a sample. Rules are evaluated in priority order and the first
/// match wins:
///
/// 1. antibiotic positive → `Fail`
/// 2. added water above zero → `Fail`
/// 3. raw milk with density outside `[1.028, 1.034]` → `Warning`
/// 4. raw milk with pH below 6.0 → `Fail`
/// 5. otherwise → `Pass`
pub fn classify_lab_result(sample_type: SampleType, m: &LabMeasurements) -> LabResult {
    if m.antibiotic == Some(AntibioticResult::Positive) {
        return LabResult::Fail;
    }

    if m.water.is_some_and(|w| w > Decimal::ZERO) {
        return LabResult::Fail;
    }

    if sample_type == SampleType::RawMilk {
        if m
            .density
            .is_some_and(|d| d < RAW_MILK_DENSITY_MIN || d > RAW_MILK_DENSITY_MAX)
        {
            return LabResult::Warning;
        }

        if m.ph.is_some_and(|ph| ph < RAW_MILK_PH_MIN) {
            return LabResult::Fail;
        }
    }

    LabResult::Pass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_bounds_are_exact() {
        assert_eq!(RAW_MILK_DENSITY_MIN.to_string(), "1.028");
        assert_eq!(RAW_MILK_DENSITY_MAX.to_string(), "1.034");
        assert_eq!(RAW_MILK_PH_MIN.to_string(), "6.0");
    }

    #[test]
    fn empty_measurements_pass() {
        let m = LabMeasurements::default();
        assert_eq!(classify_lab_result(SampleType::RawMilk, &m), LabResult::Pass);
        assert_eq!(classify_lab_result(SampleType::FinishedGood, &m), LabResult::Pass);
    }

    #[test]
    fn density_rule_ignores_non_raw_samples() {
        let m = LabMeasurements {
            density: Some(Decimal::new(1010, 3)),
            ph: Some(Decimal::new(45, 1)),
            ..Default::default()
        };
        assert_eq!(classify_lab_result(SampleType::WorkInProgress, &m), LabResult::Pass);
    }

    #[test]
    fn enum_keys_round_trip_through_as_str() {
        for t in [SampleType::RawMilk, SampleType::WorkInProgress, SampleType::FinishedGood] {
            assert_eq!(SampleType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(LabResult::from_str("pass"), None);
    }
}
