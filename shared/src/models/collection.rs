//! Milk collection entry models

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review status of a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Pending => "PENDING",
            CollectionStatus::Approved => "APPROVED",
            CollectionStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(CollectionStatus::Pending),
            "APPROVED" => Some(CollectionStatus::Approved),
            "REJECTED" => Some(CollectionStatus::Rejected),
            _ => None,
        }
    }

    /// Approved deliveries are locked
    pub fn is_mutable(&self) -> bool {
        !matches!(self, CollectionStatus::Approved)
    }

    /// Whether the delivery counts towards the monthly figures
    pub fn counts_towards_summary(&self) -> bool {
        !matches!(self, CollectionStatus::Rejected)
    }
}

/// Parse a client timestamp.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC) or a
/// bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Resolve the delivery timestamp sent by the client; anything absent or
/// unparseable becomes `now`.
pub fn resolve_collected_at(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(parse_timestamp).unwrap_or(now)
}
