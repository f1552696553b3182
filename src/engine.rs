//! The workflow engine: starts runs, advances them through gated phases,
//! records decisions and artifacts, and finalizes them.
//!
//! All state is per-instance: an engine owns its registry, classifier, gate
//! runner, and store, and holds at most one workflow as "current". There is
//! no ambient global; tests construct as many independent engines as they
//! like. Every mutation writes through to the state store before returning.
//!
//! A blocked advance is an outcome, not an error: the caller gets the gate
//! result back as data. Only genuine misuse (operating with nothing active)
//! is an error.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::EngineError;
use crate::gates::{GateId, GateRunner, QualityGateResult};
use crate::model::{
    Artifact, ArtifactFields, Decision, DecisionFields, Transition, Workflow, WorkflowStatus,
};
use crate::phase::{PhaseId, PhaseRegistry, Progress};
use crate::scale::{
    ChangeSummary, HeuristicRouter, ScaleClassifier, ScaleRecommendation, ScaleRequest, ScaleTier,
};
use crate::state::StateStore;

/// Options for `start`.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub description: String,
    /// Explicit tier; always wins when recognized.
    pub scale: Option<ScaleTier>,
    /// Change-size hint for scale detection.
    pub changes: Option<ChangeSummary>,
}

/// Options for `advance`.
#[derive(Debug, Clone, Default)]
pub struct AdvanceOptions {
    /// Advance even when the gate has blocking failures.
    pub force: bool,
    pub notes: String,
}

/// What an `advance` call did.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// Moved forward one phase.
    Advanced {
        phase: PhaseId,
        gate: QualityGateResult,
    },
    /// Blocking gate failures and `force` was off; nothing changed.
    Blocked { gate: QualityGateResult },
    /// The current phase was the last one; the workflow completed.
    Completed(CompletionReport),
}

/// Result of completing a workflow. The final gate is informational: it is
/// always recorded but never blocks completion.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub workflow: Workflow,
    pub final_gate: QualityGateResult,
}

/// Read projection of the current workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatusView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub scale: ScaleTier,
    pub phases: Vec<PhaseId>,
    pub current_phase: PhaseId,
    pub current_phase_index: usize,
    pub status: WorkflowStatus,
    pub duration: String,
    pub progress: Progress,
    pub decisions: Vec<Decision>,
    pub artifacts: Vec<Artifact>,
    pub gates: BTreeMap<GateId, QualityGateResult>,
}

/// Active workflow plus historical records.
#[derive(Debug, Clone)]
pub struct WorkflowList {
    pub active: Option<Workflow>,
    pub history: Vec<Workflow>,
}

pub struct WorkflowEngine {
    registry: PhaseRegistry,
    classifier: Box<dyn ScaleClassifier>,
    gates: GateRunner,
    store: StateStore,
    current: Option<Workflow>,
}

impl WorkflowEngine {
    pub fn new(
        registry: PhaseRegistry,
        classifier: Box<dyn ScaleClassifier>,
        gates: GateRunner,
        store: StateStore,
    ) -> Self {
        Self {
            registry,
            classifier,
            gates,
            store,
            current: None,
        }
    }

    /// An engine with the built-in tier table, default checks, and a store at
    /// `state_file`. `cwd` is the working directory for command checks.
    pub fn with_defaults(state_file: impl Into<std::path::PathBuf>, cwd: &Path) -> Self {
        Self::new(
            PhaseRegistry::default(),
            Box::new(HeuristicRouter::default()),
            GateRunner::with_defaults(cwd),
            StateStore::new(state_file),
        )
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn gates(&self) -> &GateRunner {
        &self.gates
    }

    /// The mutable check registry — the extension point for host-supplied
    /// validation. Do not mutate while a gate run is in flight.
    pub fn gates_mut(&mut self) -> &mut GateRunner {
        &mut self.gates
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    /// Explain what tier a request would resolve to, without starting anything.
    pub fn recommend(&self, request: &ScaleRequest) -> ScaleRecommendation {
        self.classifier.recommend(request)
    }

    /// Start a new workflow and make it current.
    pub fn start(&mut self, name: &str, options: StartOptions) -> Result<&Workflow, EngineError> {
        let request = ScaleRequest {
            scale: options.scale,
            description: (!options.description.is_empty()).then(|| options.description.clone()),
            changes: options.changes,
        };
        let scale = self.classifier.classify(&request);
        let phases = self.registry.sequence_ids(scale)?.to_vec();
        if phases.is_empty() {
            return Err(EngineError::NoPhaseAvailable {
                scale: scale.to_string(),
            });
        }

        let workflow = Workflow::new(name, &options.description, scale, phases);
        tracing::info!(id = %workflow.id, %scale, "workflow started");
        self.store.save(&workflow);
        self.current = Some(workflow);
        Ok(self.current.as_ref().expect("just set"))
    }

    /// Run the current phase's gate and, if it allows, move forward exactly
    /// one phase. On the last phase this delegates to `complete`.
    pub async fn advance(
        &mut self,
        options: AdvanceOptions,
    ) -> Result<AdvanceOutcome, EngineError> {
        let (from, on_last) = {
            let workflow = self.current.as_ref().ok_or(EngineError::NoActiveWorkflow)?;
            (workflow.current_phase, workflow.on_last_phase())
        };

        let gate = self.gates.run_gate(GateId::Phase(from)).await;
        if !gate.passed && !options.force {
            tracing::info!(phase = %from, failures = gate.failures.len(), "advance blocked by gate");
            return Ok(AdvanceOutcome::Blocked { gate });
        }

        if on_last {
            // Record the exit gate for the last phase, then finish.
            let workflow = self.current.as_mut().ok_or(EngineError::NoActiveWorkflow)?;
            workflow.gates.insert(GateId::Phase(from), gate);
            return Ok(AdvanceOutcome::Completed(self.complete().await?));
        }

        let workflow = self.current.as_mut().ok_or(EngineError::NoActiveWorkflow)?;
        let next_index = workflow.current_phase_index + 1;
        let to = workflow.phases[next_index];

        workflow.transitions.push(Transition {
            from,
            to,
            timestamp: Utc::now(),
            notes: options.notes,
            gate_result: gate.clone(),
        });
        workflow.gates.insert(GateId::Phase(from), gate.clone());
        workflow.current_phase = to;
        workflow.current_phase_index = next_index;

        tracing::info!(id = %workflow.id, %from, %to, "phase advanced");
        let snapshot = workflow.clone();
        self.store.save(&snapshot);

        Ok(AdvanceOutcome::Advanced { phase: to, gate })
    }

    /// Run the FINAL gate, mark the workflow completed, and move it to history.
    pub async fn complete(&mut self) -> Result<CompletionReport, EngineError> {
        if self.current.is_none() {
            return Err(EngineError::NoActiveWorkflow);
        }

        let final_gate = self.gates.run_gate(GateId::Final).await;

        let mut workflow = self.current.take().expect("checked above");
        workflow.gates.insert(GateId::Final, final_gate.clone());
        workflow.complete();
        self.store.save(&workflow);
        tracing::info!(id = %workflow.id, passed = final_gate.passed, "workflow completed");

        Ok(CompletionReport {
            workflow,
            final_gate,
        })
    }

    /// Mark the current workflow cancelled. No gate runs.
    pub fn cancel(&mut self, reason: &str) -> Result<Workflow, EngineError> {
        let mut workflow = self.current.take().ok_or(EngineError::NoActiveWorkflow)?;
        workflow.cancel(reason);
        self.store.save(&workflow);
        tracing::info!(id = %workflow.id, reason, "workflow cancelled");
        Ok(workflow)
    }

    /// Current workflow status, recovering a running record from the store
    /// after a restart. `None` when nothing is active anywhere.
    pub fn status(&mut self) -> Option<WorkflowStatusView> {
        if self.current.is_none() {
            self.current = self.store.load();
        }
        let workflow = self.current.as_ref()?;

        Some(WorkflowStatusView {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            scale: workflow.scale,
            phases: workflow.phases.clone(),
            current_phase: workflow.current_phase,
            current_phase_index: workflow.current_phase_index,
            status: workflow.status,
            duration: workflow.duration_string(Utc::now()),
            progress: Progress::of(
                workflow.current_phase_index + 1,
                workflow.phases.len(),
            ),
            decisions: workflow.decisions.clone(),
            artifacts: workflow.artifacts.clone(),
            gates: workflow.gates.clone(),
        })
    }

    /// Append a decision tagged with the current phase and persist it.
    pub fn record_decision(&mut self, fields: DecisionFields) -> Result<Decision, EngineError> {
        let workflow = self.current.as_mut().ok_or(EngineError::NoActiveWorkflow)?;
        let decision = Decision::new(workflow.current_phase, fields);
        workflow.decisions.push(decision.clone());
        let snapshot = workflow.clone();
        self.store.save(&snapshot);
        Ok(decision)
    }

    /// Append an artifact record tagged with the current phase and persist it.
    pub fn add_artifact(&mut self, fields: ArtifactFields) -> Result<Artifact, EngineError> {
        let workflow = self.current.as_mut().ok_or(EngineError::NoActiveWorkflow)?;
        let artifact = Artifact::new(workflow.current_phase, fields);
        workflow.artifacts.push(artifact.clone());
        let snapshot = workflow.clone();
        self.store.save(&snapshot);
        Ok(artifact)
    }

    /// Active workflow (in memory or recoverable) plus all terminal records.
    pub fn list(&mut self) -> WorkflowList {
        let active = self.current.clone().or_else(|| self.store.load());
        let history = self
            .store
            .list_all()
            .into_iter()
            .filter(|w| !w.is_running())
            .collect();
        WorkflowList { active, history }
    }
}
