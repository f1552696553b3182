//! Workflow records: the aggregate root plus its append-only entries.
//!
//! A `Workflow` is created by the engine, mutated only through engine
//! operations while `status == Running`, and becomes immutable history once
//! terminal. Decisions and artifacts are append-only; they are never edited
//! or removed except by deleting the owning workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::gates::{GateId, QualityGateResult};
use crate::phase::PhaseId;
use crate::scale::ScaleTier;

/// Generate a prefixed identifier, unique across repeated calls.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A choice made during a run, with the alternatives that were considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    /// Phase that was current when the decision was recorded.
    pub phase: PhaseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied decision fields; id, phase, and timestamp are assigned on record.
#[derive(Debug, Clone, Default)]
pub struct DecisionFields {
    pub title: String,
    pub description: String,
    pub alternatives: Vec<String>,
}

impl Decision {
    pub fn new(phase: PhaseId, fields: DecisionFields) -> Self {
        Self {
            id: generate_id("decision"),
            phase,
            title: fields.title,
            description: fields.description,
            alternatives: fields.alternatives,
            timestamp: Utc::now(),
        }
    }
}

/// Metadata for an output produced during a run. The artifact record does not
/// hold the content itself, only where to find it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    /// Phase that was current when the artifact was added.
    pub phase: PhaseId,
    pub name: String,
    /// Free-form type tag: "code", "doc", "test", ...
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied artifact fields; id, phase, and timestamp are assigned on add.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFields {
    pub name: String,
    pub kind: String,
    pub path: Option<PathBuf>,
    pub description: Option<String>,
}

impl Artifact {
    pub fn new(phase: PhaseId, fields: ArtifactFields) -> Self {
        Self {
            id: generate_id("artifact"),
            phase,
            name: fields.name,
            kind: fields.kind,
            path: fields.path,
            description: fields.description,
            timestamp: Utc::now(),
        }
    }
}

/// One phase-exit transition, with the gate result that allowed (or was
/// forced past) it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: PhaseId,
    pub to: PhaseId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    pub gate_result: QualityGateResult,
}

/// The aggregate root: one unit of work moving through its phase sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scale: ScaleTier,
    /// Resolved phase sequence for `scale`, fixed at start.
    pub phases: Vec<PhaseId>,
    pub current_phase: PhaseId,
    pub current_phase_index: usize,
    pub status: WorkflowStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Gate results keyed by the phase that was exited (plus FINAL).
    #[serde(default)]
    pub gates: BTreeMap<GateId, QualityGateResult>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl Workflow {
    /// Create a fresh running workflow at the first phase of `phases`.
    /// `phases` must be non-empty; the engine validates this before calling.
    pub fn new(name: &str, description: &str, scale: ScaleTier, phases: Vec<PhaseId>) -> Self {
        let current_phase = phases[0];
        Self {
            id: generate_id("workflow"),
            name: name.to_string(),
            description: description.to_string(),
            scale,
            phases,
            current_phase,
            current_phase_index: 0,
            status: WorkflowStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            decisions: Vec::new(),
            artifacts: Vec::new(),
            gates: BTreeMap::new(),
            transitions: Vec::new(),
            cancel_reason: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == WorkflowStatus::Running
    }

    /// Whether the current phase is the last one in the sequence.
    pub fn on_last_phase(&self) -> bool {
        self.current_phase_index + 1 >= self.phases.len()
    }

    pub fn complete(&mut self) {
        self.status = WorkflowStatus::Completed;
        self.end_time = Some(Utc::now());
    }

    pub fn cancel(&mut self, reason: &str) {
        self.status = WorkflowStatus::Cancelled;
        self.end_time = Some(Utc::now());
        self.cancel_reason = Some(reason.to_string());
    }

    /// Elapsed duration, from start to end once terminal, otherwise to `now`.
    pub fn duration_string(&self, now: DateTime<Utc>) -> String {
        let end = self.end_time.unwrap_or(now);
        let elapsed = (end - self.start_time).max(chrono::Duration::zero());
        let minutes = elapsed.num_minutes();
        let seconds = elapsed.num_seconds() % 60;
        if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }
}
