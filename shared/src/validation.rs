//! Validation utilities for the Dairy ERP platform

use rust_decimal::Decimal;

use crate::models::LabMeasurements;

// ============================================================================
// Laboratory Validations
// ============================================================================

/// Validate a percentage value (0-100)
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a pH value (0-14)
pub fn validate_ph(ph: Decimal) -> Result<(), &'static str> {
    if ph < Decimal::ZERO || ph > Decimal::from(14) {
        return Err("pH must be between 0 and 14");
    }
    Ok(())
}

/// Validate a density reading in g/ml. Milk sits around 1.03; anything
/// outside 0.9-1.2 is a typing error rather than a bad sample.
pub fn validate_density(density: Decimal) -> Result<(), &'static str> {
    if density < Decimal::new(9, 1) || density > Decimal::new(12, 1) {
        return Err("Density must be between 0.9 and 1.2 g/ml");
    }
    Ok(())
}

/// Validate every measurement that is present, returning the field name on failure
pub fn validate_measurements(m: &LabMeasurements) -> Result<(), (&'static str, &'static str)> {
    for (field, value) in [("fat", m.fat), ("protein", m.protein), ("water", m.water)] {
        if let Some(v) = value {
            validate_percentage(v).map_err(|e| (field, e))?;
        }
    }
    if let Some(ph) = m.ph {
        validate_ph(ph).map_err(|e| ("ph", e))?;
    }
    if let Some(d) = m.density {
        validate_density(d).map_err(|e| ("density", e))?;
    }
    if m.scc.is_some_and(|v| v < 0) {
        return Err(("scc", "Somatic cell count cannot be negative"));
    }
    if m.cfu.is_some_and(|v| v < 0) {
        return Err(("cfu", "Colony count cannot be negative"));
    }
    Ok(())
}

// ============================================================================
// Collection Validations
// ============================================================================

/// Validate a delivered quantity in liters
pub fn validate_quantity(liters: Decimal) -> Result<(), &'static str> {
    if liters <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a vehicle plate: letters, digits, spaces and dashes
pub fn validate_plate_number(plate: &str) -> Result<(), &'static str> {
    let plate = plate.trim();
    if plate.len() < 2 || plate.len() > 15 {
        return Err("Plate number must be 2 to 15 characters");
    }
    if !plate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
    {
        return Err("Plate number may only contain letters, digits, spaces and dashes");
    }
    Ok(())
}

/// Normalize a plate for storage and lookup
pub fn normalize_plate_number(plate: &str) -> String {
    plate.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AntibioticResult;

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage(Decimal::ZERO).is_ok());
        assert!(validate_percentage(Decimal::new(385, 2)).is_ok());
        assert!(validate_percentage(Decimal::from(100)).is_ok());
        assert!(validate_percentage(Decimal::from(-1)).is_err());
        assert!(validate_percentage(Decimal::from(101)).is_err());
    }

    #[test]
    fn test_validate_ph() {
        assert!(validate_ph(Decimal::new(67, 1)).is_ok());
        assert!(validate_ph(Decimal::from(15)).is_err());
    }

    #[test]
    fn test_validate_density() {
        assert!(validate_density(Decimal::new(1030, 3)).is_ok());
        assert!(validate_density(Decimal::new(1020, 3)).is_ok());
        assert!(validate_density(Decimal::from(30)).is_err());
    }

    #[test]
    fn test_validate_measurements_reports_field() {
        let m = LabMeasurements {
            fat: Some(Decimal::new(38, 1)),
            protein: Some(Decimal::from(120)),
            antibiotic: Some(AntibioticResult::Negative),
            ..Default::default()
        };
        assert_eq!(validate_measurements(&m).unwrap_err().0, "protein");
        assert!(validate_measurements(&LabMeasurements::default()).is_ok());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(Decimal::new(1, 1)).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_plate_number() {
        assert!(validate_plate_number("B-123-ABC").is_ok());
        assert!(validate_plate_number("CJ 07 XYZ").is_ok());
        assert!(validate_plate_number("X").is_err());
        assert!(validate_plate_number("B_123").is_err());
        assert_eq!(normalize_plate_number(" cj-07-xyz "), "CJ-07-XYZ");
    }
}
