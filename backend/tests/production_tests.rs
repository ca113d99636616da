//! Production monitoring tests for the Dairy ERP platform
//!
//! Covers:
//! - Step temperature rules for pasteurization (CCP1) and fermentation
//! - Manual reading deviation against the step target
//! - The batch step workflow (NEXT, PREV, PAUSE, COMPLETE)

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    deviation_alert, evaluate_step, has_deviation_alert, is_temperature_deviation,
    step_target_temperature, BatchPosition, BatchStatus, ProductionStep, StepAction, StepStatus,
    TransitionError,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn action_strategy() -> impl Strategy<Value = StepAction> {
    prop_oneof![
        Just(StepAction::Next),
        Just(StepAction::Prev),
        Just(StepAction::Pause),
        Just(StepAction::Complete),
    ]
}

fn open_status_strategy() -> impl Strategy<Value = BatchStatus> {
    prop_oneof![
        Just(BatchStatus::Running),
        Just(BatchStatus::Paused),
        Just(BatchStatus::Issue),
    ]
}

fn step(label: &str, target: Option<&str>) -> ProductionStep {
    ProductionStep {
        label: label.to_string(),
        duration_minutes: Some(30),
        target_temperature: target.map(dec),
    }
}

// ============================================================================
// Step temperature rules
// ============================================================================

#[test]
fn test_pasteurization_thresholds() {
    let label = "Pasteurizare CCP1";
    assert_eq!(evaluate_step(label, dec("70.0")), StepStatus::Critical);
    assert_eq!(evaluate_step(label, dec("71.4")), StepStatus::Critical);
    assert_eq!(evaluate_step(label, dec("71.5")), StepStatus::Warning);
    assert_eq!(evaluate_step(label, dec("71.8")), StepStatus::Warning);
    assert_eq!(evaluate_step(label, dec("72.0")), StepStatus::Ok);
    assert_eq!(evaluate_step(label, dec("72.5")), StepStatus::Ok);
}

#[test]
fn test_fermentation_thresholds() {
    let label = "Fermentation";
    assert_eq!(evaluate_step(label, dec("44.5")), StepStatus::Critical);
    assert_eq!(evaluate_step(label, dec("44.0")), StepStatus::Warning);
    assert_eq!(evaluate_step(label, dec("43.5")), StepStatus::Warning);
    assert_eq!(evaluate_step(label, dec("43.0")), StepStatus::Ok);
    assert_eq!(evaluate_step(label, dec("42.0")), StepStatus::Ok);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Steps without a monitored keyword never raise a status
    #[test]
    fn unmonitored_steps_are_always_ok(temp in -500i64..2000) {
        let t = Decimal::new(temp, 1);
        prop_assert_eq!(evaluate_step("Cooling", t), StepStatus::Ok);
        prop_assert_eq!(evaluate_step("Packaging", t), StepStatus::Ok);
    }

    /// Hotter pasteurization is never worse than colder pasteurization
    #[test]
    fn pasteurization_status_is_monotonic(a in 600i64..800, b in 600i64..800) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let rank = |s: StepStatus| match s {
            StepStatus::Ok => 0,
            StepStatus::Warning => 1,
            StepStatus::Critical => 2,
        };
        let cold = evaluate_step("Pasteurization", Decimal::new(lo, 1));
        let hot = evaluate_step("Pasteurization", Decimal::new(hi, 1));
        prop_assert!(rank(hot) <= rank(cold));
    }

    /// A reading deviates exactly when it is more than 1.5 degrees off target
    #[test]
    fn deviation_matches_tolerance(target in 300i64..900, offset in -50i64..50) {
        let target = Decimal::new(target, 1);
        let reading = target + Decimal::new(offset, 1);
        prop_assert_eq!(
            is_temperature_deviation(target, reading),
            offset.abs() > 15
        );
    }
}

#[test]
fn test_deviation_boundary() {
    assert!(!is_temperature_deviation(dec("72"), dec("70.5")));
    assert!(is_temperature_deviation(dec("72"), dec("70.4")));
    assert!(is_temperature_deviation(dec("72"), dec("73.6")));
}

#[test]
fn test_deviation_alert_deduplication() {
    let alerts = vec![deviation_alert(dec("72"), dec("69"))];
    assert!(has_deviation_alert(&alerts));
    assert!(!has_deviation_alert(&[]));
}

#[test]
fn test_step_target_overrides_batch_target() {
    let steps = vec![step("Heating", None), step("Fermentation", Some("43"))];
    assert_eq!(step_target_temperature(&steps, 0, dec("72")), dec("72"));
    assert_eq!(step_target_temperature(&steps, 1, dec("72")), dec("43"));
    assert_eq!(step_target_temperature(&steps, 5, dec("72")), dec("72"));
}

// ============================================================================
// Step workflow
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Nothing moves a completed batch
    #[test]
    fn completed_batch_rejects_every_action(
        action in action_strategy(),
        steps in 1usize..10,
    ) {
        let pos = BatchPosition::new(BatchStatus::Completed, steps - 1);
        prop_assert_eq!(pos.apply(action, steps), Err(TransitionError::AlreadyCompleted));
    }

    /// Any action keeps the current step inside the recipe
    #[test]
    fn step_index_stays_in_range(
        status in open_status_strategy(),
        action in action_strategy(),
        (steps, current) in (1usize..10).prop_flat_map(|n| (Just(n), 0..n)),
    ) {
        let t = BatchPosition::new(status, current).apply(action, steps).unwrap();
        prop_assert!(t.position.current_step < steps);
    }

    /// NEXT and PREV always leave the batch running or completed
    #[test]
    fn moving_clears_pause_and_issue(
        status in open_status_strategy(),
        action in prop_oneof![Just(StepAction::Next), Just(StepAction::Prev)],
        (steps, current) in (2usize..10).prop_flat_map(|n| (Just(n), 0..n - 1)),
    ) {
        let t = BatchPosition::new(status, current).apply(action, steps).unwrap();
        prop_assert_eq!(t.position.status, BatchStatus::Running);
    }
}

#[test]
fn test_next_advances_and_records_finished_step() {
    let t = BatchPosition::new(BatchStatus::Running, 0)
        .apply(StepAction::Next, 3)
        .unwrap();
    assert_eq!(t.position, BatchPosition::new(BatchStatus::Running, 1));
    assert_eq!(t.finished_step, Some(0));
}

#[test]
fn test_next_on_last_step_completes() {
    let t = BatchPosition::new(BatchStatus::Running, 2)
        .apply(StepAction::Next, 3)
        .unwrap();
    assert_eq!(t.position.status, BatchStatus::Completed);
    assert_eq!(t.position.current_step, 2);
    assert_eq!(t.finished_step, Some(2));
}

#[test]
fn test_prev_stops_at_first_step() {
    let t = BatchPosition::new(BatchStatus::Paused, 0)
        .apply(StepAction::Prev, 3)
        .unwrap();
    assert_eq!(t.position, BatchPosition::new(BatchStatus::Running, 0));
    assert_eq!(t.finished_step, None);
}

#[test]
fn test_pause_toggles() {
    let paused = BatchPosition::new(BatchStatus::Running, 1)
        .apply(StepAction::Pause, 3)
        .unwrap()
        .position;
    assert_eq!(paused.status, BatchStatus::Paused);

    let resumed = paused.apply(StepAction::Pause, 3).unwrap().position;
    assert_eq!(resumed, BatchPosition::new(BatchStatus::Running, 1));
}

#[test]
fn test_next_overwrites_issue() {
    let t = BatchPosition::new(BatchStatus::Issue, 0)
        .apply(StepAction::Next, 2)
        .unwrap();
    assert_eq!(t.position.status, BatchStatus::Running);
}

#[test]
fn test_complete_jumps_to_last_step() {
    let t = BatchPosition::new(BatchStatus::Running, 0)
        .apply(StepAction::Complete, 4)
        .unwrap();
    assert_eq!(t.position, BatchPosition::new(BatchStatus::Completed, 3));
    assert_eq!(t.finished_step, Some(0));
}

#[test]
fn test_batch_without_steps_is_rejected() {
    assert_eq!(
        BatchPosition::new(BatchStatus::Running, 0).apply(StepAction::Next, 0),
        Err(TransitionError::NoSteps)
    );
}

#[test]
fn test_corrupt_step_index_is_rejected() {
    assert_eq!(
        BatchPosition::new(BatchStatus::Running, 5).apply(StepAction::Prev, 3),
        Err(TransitionError::StepOutOfRange { current: 5, count: 3 })
    );
}

#[test]
fn test_step_action_wire_format() {
    let action: StepAction = serde_json::from_str("\"COMPLETE\"").unwrap();
    assert_eq!(action, StepAction::Complete);
    assert_eq!(BatchStatus::from_str("ISSUE"), Some(BatchStatus::Issue));
    assert_eq!(BatchStatus::Paused.as_str(), "PAUSED");
}
