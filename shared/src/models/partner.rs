//! Partner (supplier/customer) reference models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Commercial role of a partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerType {
    #[default]
    Supplier,
    Customer,
    Both,
}

impl PartnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerType::Supplier => "SUPPLIER",
            PartnerType::Customer => "CUSTOMER",
            PartnerType::Both => "BOTH",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SUPPLIER" => Some(PartnerType::Supplier),
            "CUSTOMER" => Some(PartnerType::Customer),
            "BOTH" => Some(PartnerType::Both),
            _ => None,
        }
    }

    pub fn supplies_milk(&self) -> bool {
        matches!(self, PartnerType::Supplier | PartnerType::Both)
    }
}

/// Identity of a partner as far as import matching is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerKey {
    pub id: Uuid,
    pub name: String,
    pub tax_number: Option<String>,
}

/// Normalized tax number; empty values count as missing
pub fn normalize_tax_number(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
}

/// Normalized name used for case-insensitive matching
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
