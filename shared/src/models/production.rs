//! Production batch models, the step temperature rule and the batch workflow

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pasteurization (CCP1) hard minimum, °C
pub const PASTEURIZATION_CRITICAL_BELOW: Decimal = Decimal::from_parts(715, 0, 0, false, 1);
/// Pasteurization warning band upper edge, °C
pub const PASTEURIZATION_WARNING_BELOW: Decimal = Decimal::from_parts(720, 0, 0, false, 1);
/// Fermentation hard maximum, °C
pub const FERMENTATION_CRITICAL_ABOVE: Decimal = Decimal::from_parts(440, 0, 0, false, 1);
/// Fermentation warning band lower edge, °C
pub const FERMENTATION_WARNING_ABOVE: Decimal = Decimal::from_parts(430, 0, 0, false, 1);
/// Allowed distance between a manual reading and the target temperature
pub const TEMPERATURE_DEVIATION_TOLERANCE: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
/// Prefix shared by every deviation alert; at most one such alert per batch
pub const TEMPERATURE_DEVIATION_ALERT: &str = "Temperature deviation";

/// Status of a single step reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Ok,
    Warning,
    Critical,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Ok => "OK",
            StepStatus::Warning => "WARNING",
            StepStatus::Critical => "CRITICAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(StepStatus::Ok),
            "WARNING" => Some(StepStatus::Warning),
            "CRITICAL" => Some(StepStatus::Critical),
            _ => None,
        }
    }
}

/// Evaluate a temperature reading against the rule for its step.
///
/// Steps are recognised by a case-insensitive keyword in their label:
/// pasteurization ("pasteur", "ccp1") has a lower bound, fermentation
/// ("ferment") an upper bound. Any other step is always `Ok`.
pub fn evaluate_step(step_label: &str, temperature: Decimal) -> StepStatus {
    let label = step_label.to_lowercase();

    if label.contains("pasteur") || label.contains("ccp1") {
        if temperature < PASTEURIZATION_CRITICAL_BELOW {
            StepStatus::Critical
        } else if temperature < PASTEURIZATION_WARNING_BELOW {
            StepStatus::Warning
        } else {
            StepStatus::Ok
        }
    } else if label.contains("ferment") {
        if temperature > FERMENTATION_CRITICAL_ABOVE {
            StepStatus::Critical
        } else if temperature > FERMENTATION_WARNING_ABOVE {
            StepStatus::Warning
        } else {
            StepStatus::Ok
        }
    } else {
        StepStatus::Ok
    }
}

/// Whether a manual reading is far enough from the target to raise an alert
pub fn is_temperature_deviation(target: Decimal, reading: Decimal) -> bool {
    (reading - target).abs() > TEMPERATURE_DEVIATION_TOLERANCE
}

/// Build the alert message for a deviating reading
pub fn deviation_alert(target: Decimal, reading: Decimal) -> String {
    format!(
        "{}: measured {}°C, target {}°C",
        TEMPERATURE_DEVIATION_ALERT, reading, target
    )
}

/// Whether the alert list already carries a deviation alert
pub fn has_deviation_alert(alerts: &[String]) -> bool {
    alerts
        .iter()
        .any(|a| a.starts_with(TEMPERATURE_DEVIATION_ALERT))
}

/// One step of a batch recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionStep {
    pub label: String,
    pub duration_minutes: Option<i32>,
    pub target_temperature: Option<Decimal>,
}

/// A finished step as recorded by the NEXT action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepHistoryEntry {
    pub step_label: String,
    pub elapsed_minutes: Option<i32>,
    pub finished_at: DateTime<Utc>,
}

/// Overall batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Running,
    Paused,
    Completed,
    Issue,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Running => "RUNNING",
            BatchStatus::Paused => "PAUSED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Issue => "ISSUE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(BatchStatus::Running),
            "PAUSED" => Some(BatchStatus::Paused),
            "COMPLETED" => Some(BatchStatus::Completed),
            "ISSUE" => Some(BatchStatus::Issue),
            _ => None,
        }
    }
}

/// Operator action on the step workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Next,
    Prev,
    Pause,
    Complete,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("batch is already completed")]
    AlreadyCompleted,

    #[error("batch has no steps")]
    NoSteps,

    #[error("current step {current} is outside the {count} recipe steps")]
    StepOutOfRange { current: usize, count: usize },
}

/// Position of a batch in its workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    pub status: BatchStatus,
    pub current_step: usize,
}

/// Result of applying an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub position: BatchPosition,
    /// Step that was finished by this action, if any
    pub finished_step: Option<usize>,
}

impl BatchPosition {
    pub fn new(status: BatchStatus, current_step: usize) -> Self {
        Self {
            status,
            current_step,
        }
    }

    /// Apply an operator action to a batch with `step_count` steps.
    ///
    /// NEXT and PREV always leave the batch RUNNING, which overwrites an
    /// ISSUE status. PAUSE toggles between PAUSED and RUNNING. Nothing
    /// moves a COMPLETED batch.
    pub fn apply(
        self,
        action: StepAction,
        step_count: usize,
    ) -> Result<Transition, TransitionError> {
        if self.status == BatchStatus::Completed {
            return Err(TransitionError::AlreadyCompleted);
        }
        if step_count == 0 {
            return Err(TransitionError::NoSteps);
        }
        if self.current_step >= step_count {
            return Err(TransitionError::StepOutOfRange {
                current: self.current_step,
                count: step_count,
            });
        }

        let last = step_count - 1;
        let transition = match action {
            StepAction::Next if self.current_step == last => Transition {
                position: BatchPosition::new(BatchStatus::Completed, last),
                finished_step: Some(last),
            },
            StepAction::Next => Transition {
                position: BatchPosition::new(BatchStatus::Running, self.current_step + 1),
                finished_step: Some(self.current_step),
            },
            StepAction::Prev => Transition {
                position: BatchPosition::new(
                    BatchStatus::Running,
                    self.current_step.saturating_sub(1),
                ),
                finished_step: None,
            },
            StepAction::Pause => {
                let status = if self.status == BatchStatus::Paused {
                    BatchStatus::Running
                } else {
                    BatchStatus::Paused
                };
                Transition {
                    position: BatchPosition::new(status, self.current_step),
                    finished_step: None,
                }
            }
            StepAction::Complete => Transition {
                position: BatchPosition::new(BatchStatus::Completed, last),
                finished_step: Some(self.current_step),
            },
        };

        Ok(transition)
    }
}

/// Target temperature for the current step, falling back to the batch target
pub fn step_target_temperature(
    steps: &[ProductionStep],
    current_step: usize,
    batch_target: Decimal,
) -> Decimal {
    steps
        .get(current_step)
        .and_then(|s| s.target_temperature)
        .unwrap_or(batch_target)
}
