//! WebAssembly module for the Dairy ERP platform
//!
//! Provides client-side computation for:
//! - Lab result preview while a sample is being entered
//! - Production step status and deviation checks
//! - Monthly summary figures and month validation
//! - Offline data validation

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    js_sys::Error::new(&message).into()
}

fn to_decimal(field: &str, value: f64) -> Result<Decimal, JsValue> {
    Decimal::try_from(value).map_err(|_| js_error(format!("{} is not a finite number", field)))
}

/// Preview the result of a lab sample.
///
/// `sample_type` is a wire key such as `RAW_MILK`; `measurements_json` uses
/// the same camelCase fields as the API.
#[wasm_bindgen]
pub fn classify_lab_sample(sample_type: &str, measurements_json: &str) -> Result<String, JsValue> {
    let sample_type = SampleType::from_str(sample_type)
        .ok_or_else(|| js_error(format!("Unknown sample type '{}'", sample_type)))?;
    let measurements: LabMeasurements = serde_json::from_str(measurements_json)
        .map_err(|e| js_error(format!("Invalid measurements JSON: {}", e)))?;

    if let Err((field, message)) = validate_measurements(&measurements) {
        return Err(js_error(format!("{}: {}", field, message)));
    }

    Ok(classify_lab_result(sample_type, &measurements).to_string())
}

/// Status of a temperature reading for a step label
#[wasm_bindgen]
pub fn evaluate_step_temperature(step_label: &str, temperature: f64) -> Result<String, JsValue> {
    let temperature = to_decimal("temperature", temperature)?;
    Ok(evaluate_step(step_label, temperature).as_str().to_string())
}

/// Whether a manual reading would raise a deviation alert
#[wasm_bindgen]
pub fn is_off_target(target: f64, reading: f64) -> Result<bool, JsValue> {
    Ok(is_temperature_deviation(
        to_decimal("target", target)?,
        to_decimal("reading", reading)?,
    ))
}

/// Normalize a month to `yyyy-MM`, or fail if it is not one
#[wasm_bindgen]
pub fn normalize_month(raw: &str) -> Result<String, JsValue> {
    SummaryMonth::parse(raw)
        .map(|m| m.to_string())
        .map_err(|e| js_error(e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Delivery {
    quantity_liters: Decimal,
    fat: Option<Decimal>,
    protein: Option<Decimal>,
}

/// Compute monthly figures from a JSON array of deliveries
/// (`[{quantityLiters, fat?, protein?}]`). Returns `SummaryFigures` as JSON.
#[wasm_bindgen]
pub fn summarize_month(deliveries_json: &str) -> Result<String, JsValue> {
    let deliveries: Vec<Delivery> = serde_json::from_str(deliveries_json)
        .map_err(|e| js_error(format!("Invalid deliveries JSON: {}", e)))?;

    let figures: Vec<DeliveryFigures> = deliveries
        .into_iter()
        .map(|d| DeliveryFigures {
            quantity_liters: d.quantity_liters,
            fat: d.fat,
            protein: d.protein,
        })
        .collect();

    serde_json::to_string(&summarize_deliveries(&figures))
        .map_err(|e| js_error(format!("Could not encode figures: {}", e)))
}

/// Validate a delivered quantity before queuing it offline
#[wasm_bindgen]
pub fn is_valid_quantity(liters: f64) -> bool {
    Decimal::try_from(liters)
        .map(|q| validate_quantity(q).is_ok())
        .unwrap_or(false)
}

/// Weighted average fat of a delivery set, as a number
#[wasm_bindgen]
pub fn average_fat(deliveries_json: &str) -> Result<f64, JsValue> {
    let figures: SummaryFigures = serde_json::from_str(&summarize_month(deliveries_json)?)
        .map_err(|e| js_error(e.to_string()))?;
    Ok(figures.average_fat.to_f64().unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lab_sample() {
        assert_eq!(
            classify_lab_sample("RAW_MILK", r#"{"antibiotic":"POSITIVE"}"#).unwrap(),
            "FAIL"
        );
        assert_eq!(
            classify_lab_sample("RAW_MILK", r#"{"density":1.025}"#).unwrap(),
            "WARNING"
        );
        assert_eq!(classify_lab_sample("FINISHED_GOOD", "{}").unwrap(), "PASS");
    }

    #[test]
    fn test_evaluate_step_temperature() {
        assert_eq!(evaluate_step_temperature("Pasteurizare CCP1", 70.0).unwrap(), "CRITICAL");
        assert_eq!(evaluate_step_temperature("Pasteurizare CCP1", 71.8).unwrap(), "WARNING");
        assert_eq!(evaluate_step_temperature("Pasteurizare CCP1", 72.5).unwrap(), "OK");
    }

    #[test]
    fn test_is_off_target() {
        assert!(is_off_target(72.0, 70.0).unwrap());
        assert!(!is_off_target(72.0, 71.0).unwrap());
    }

    #[test]
    fn test_summarize_month() {
        let json = summarize_month(
            r#"[{"quantityLiters":100,"fat":3.5},{"quantityLiters":300,"fat":4.1}]"#,
        )
        .unwrap();
        let figures: SummaryFigures = serde_json::from_str(&json).unwrap();
        assert_eq!(figures.total_liters, Decimal::from(400));
        assert_eq!(figures.average_fat, Decimal::new(395, 2));
        assert_eq!(figures.average_protein, Decimal::ZERO);
    }

    #[test]
    fn test_is_valid_quantity() {
        assert!(is_valid_quantity(120.5));
        assert!(!is_valid_quantity(0.0));
        assert!(!is_valid_quantity(f64::NAN));
    }
}
