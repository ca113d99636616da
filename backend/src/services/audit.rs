//! Structured audit events
//!
//! One `AuditContext` is created per request from the authenticated user and
//! handed to the services that mutate data. All audit output goes through
//! `tracing` on the `audit` target so it can be routed separately.

use std::fmt::Display;

use uuid::Uuid;

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    StepChanged,
    ReadingRecorded,
    AlertRaised,
    DraftSaved,
    Finalized,
    Imported,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
            AuditAction::StepChanged => "step_changed",
            AuditAction::ReadingRecorded => "reading_recorded",
            AuditAction::AlertRaised => "alert_raised",
            AuditAction::DraftSaved => "draft_saved",
            AuditAction::Finalized => "finalized",
            AuditAction::Imported => "imported",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditContext {
    actor: Uuid,
}

impl AuditContext {
    pub fn new(actor: Uuid) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> Uuid {
        self.actor
    }

    /// Emit one audit event
    pub fn record(&self, entity: &'static str, entity_id: impl Display, action: AuditAction) {
        tracing::info!(
            target: "audit",
            actor = %self.actor,
            entity,
            entity_id = %entity_id,
            action = action.as_str(),
            "audit event"
        );
    }

    /// Emit one audit event with a free-form detail
    pub fn record_with(
        &self,
        entity: &'static str,
        entity_id: impl Display,
        action: AuditAction,
        detail: &str,
    ) {
        tracing::info!(
            target: "audit",
            actor = %self.actor,
            entity,
            entity_id = %entity_id,
            action = action.as_str(),
            detail,
            "audit event"
        );
    }
}
