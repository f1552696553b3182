//! Durable workflow state: one JSON document holding every known run.
//!
//! The document is read-modify-written as a whole on every mutation and
//! mirrored in an in-process cache, so repeated reads are cheap. I/O errors
//! are recovered at this boundary and surfaced as boolean/empty returns with
//! a warning; losing one write degrades a long-running session, it must not
//! crash it.
//!
//! The store assumes a single process owns the state file. There is no file
//! lock or version check; two processes writing the same file race and the
//! later writer wins. Acceptable for a single-operator CLI, unresolved for
//! anything more (see DESIGN.md).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Workflow, WorkflowStatus};
use crate::scale::ScaleTier;

/// Version tag written into new state documents.
pub const STATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The persisted aggregate: every known workflow, active and historical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

impl StateDocument {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION.to_string(),
            created_at: now,
            last_updated: now,
            workflows: Vec::new(),
        }
    }
}

/// Outcome of `clear_completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOutcome {
    pub cleared: usize,
    pub remaining: usize,
}

/// Outcome of `import`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub error: Option<String>,
}

/// Workflow counts by status and by scale tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateStats {
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub by_scale: BTreeMap<ScaleTier, usize>,
}

/// File-backed store for the workflow state document.
#[derive(Debug)]
pub struct StateStore {
    state_file: PathBuf,
    cache: Option<StateDocument>,
}

impl StateStore {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            cache: None,
        }
    }

    /// Upsert a workflow by id and persist the whole document.
    /// Returns false (after logging) when the write fails.
    pub fn save(&mut self, workflow: &Workflow) -> bool {
        let mut doc = self.read_state();
        match doc.workflows.iter_mut().find(|w| w.id == workflow.id) {
            Some(existing) => *existing = workflow.clone(),
            None => doc.workflows.push(workflow.clone()),
        }
        self.write_state(doc)
    }

    /// The single workflow with `status == running`, if any.
    pub fn load(&mut self) -> Option<Workflow> {
        self.read_state()
            .workflows
            .into_iter()
            .find(|w| w.status == WorkflowStatus::Running)
    }

    pub fn load_by_id(&mut self, id: &str) -> Option<Workflow> {
        self.read_state().workflows.into_iter().find(|w| w.id == id)
    }

    /// Every known workflow, active and historical.
    pub fn list_all(&mut self) -> Vec<Workflow> {
        self.read_state().workflows
    }

    /// Remove a workflow by id. Returns true only when a record was removed
    /// and the document was written back.
    pub fn delete(&mut self, id: &str) -> bool {
        let mut doc = self.read_state();
        let before = doc.workflows.len();
        doc.workflows.retain(|w| w.id != id);
        if doc.workflows.len() == before {
            return false;
        }
        self.write_state(doc)
    }

    /// Remove every non-running workflow.
    pub fn clear_completed(&mut self) -> ClearOutcome {
        let mut doc = self.read_state();
        let before = doc.workflows.len();
        doc.workflows
            .retain(|w| w.status == WorkflowStatus::Running);
        let remaining = doc.workflows.len();
        if !self.write_state(doc) {
            return ClearOutcome {
                cleared: 0,
                remaining: before,
            };
        }
        ClearOutcome {
            cleared: before - remaining,
            remaining,
        }
    }

    pub fn stats(&mut self) -> StateStats {
        let workflows = self.read_state().workflows;
        let count_status =
            |status: WorkflowStatus| workflows.iter().filter(|w| w.status == status).count();

        let mut by_scale: BTreeMap<ScaleTier, usize> =
            ScaleTier::ALL.iter().map(|tier| (*tier, 0)).collect();
        for workflow in &workflows {
            *by_scale.entry(workflow.scale).or_insert(0) += 1;
        }

        StateStats {
            total: workflows.len(),
            running: count_status(WorkflowStatus::Running),
            completed: count_status(WorkflowStatus::Completed),
            cancelled: count_status(WorkflowStatus::Cancelled),
            by_scale,
        }
    }

    /// Dump the whole document to `path`.
    pub fn export(&mut self, path: &Path) -> bool {
        let doc = self.read_state();
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => match fs::write(path, json) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!("Failed to export state to {}: {err}", path.display());
                    false
                }
            },
            Err(err) => {
                tracing::warn!("Failed to serialize state for export: {err}");
                false
            }
        }
    }

    /// Merge workflows from an exported document, keeping existing records on
    /// id collision.
    pub fn import(&mut self, path: &Path) -> ImportOutcome {
        let imported: StateDocument = match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
        {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!("Failed to import state from {}: {err}", path.display());
                return ImportOutcome {
                    imported: 0,
                    error: Some(err),
                };
            }
        };

        let mut doc = self.read_state();
        let existing_ids: Vec<String> = doc.workflows.iter().map(|w| w.id.clone()).collect();
        let mut added = 0;
        for workflow in imported.workflows {
            if !existing_ids.contains(&workflow.id) {
                doc.workflows.push(workflow);
                added += 1;
            }
        }

        if !self.write_state(doc) {
            return ImportOutcome {
                imported: 0,
                error: Some("failed to write merged state".to_string()),
            };
        }
        ImportOutcome {
            imported: added,
            error: None,
        }
    }

    /// Replace the document with a fresh empty one.
    pub fn reset(&mut self) -> bool {
        self.write_state(StateDocument::new())
    }

    fn read_state(&mut self) -> StateDocument {
        if let Some(ref cached) = self.cache {
            return cached.clone();
        }

        if self.state_file.exists() {
            match fs::read_to_string(&self.state_file) {
                Ok(content) => match serde_json::from_str::<StateDocument>(&content) {
                    Ok(doc) => {
                        self.cache = Some(doc.clone());
                        return doc;
                    }
                    Err(err) => {
                        tracing::warn!(
                            "Ignoring unparseable state file {}: {err}",
                            self.state_file.display()
                        );
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        "Failed to read state file {}: {err}",
                        self.state_file.display()
                    );
                }
            }
        }

        let doc = StateDocument::new();
        self.cache = Some(doc.clone());
        doc
    }

    fn write_state(&mut self, mut doc: StateDocument) -> bool {
        doc.last_updated = Utc::now();
        doc.version = STATE_VERSION.to_string();

        if let Some(parent) = self.state_file.parent()
            && let Err(err) = fs::create_dir_all(parent)
        {
            tracing::warn!("Failed to create state directory {}: {err}", parent.display());
            return false;
        }

        let json = match serde_json::to_string_pretty(&doc) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!("Failed to serialize workflow state: {err}");
                return false;
            }
        };

        match fs::write(&self.state_file, json) {
            Ok(()) => {
                self.cache = Some(doc);
                true
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to write state file {}: {err}",
                    self.state_file.display()
                );
                // Cache now reflects a state the disk does not; drop it.
                self.cache = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseId;
    use tempfile::TempDir;

    fn setup_store() -> (StateStore, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = StateStore::new(dir.path().join("workflow-state.json"));
        (store, dir)
    }

    fn make_workflow(name: &str, scale: ScaleTier) -> Workflow {
        let phases = match scale {
            ScaleTier::Quick => vec![PhaseId::E, PhaseId::V],
            _ => vec![PhaseId::P, PhaseId::E, PhaseId::V],
        };
        Workflow::new(name, "", scale, phases)
    }

    #[test]
    fn test_save_creates_file_and_upserts() {
        let (mut store, dir) = setup_store();
        let mut wf = make_workflow("one", ScaleTier::Quick);
        assert!(store.save(&wf));
        assert!(dir.path().join("workflow-state.json").exists());

        // Same id saved again must not duplicate.
        wf.description = "updated".to_string();
        assert!(store.save(&wf));
        let all = store.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "updated");
    }

    #[test]
    fn test_load_returns_only_running() {
        let (mut store, _dir) = setup_store();
        let mut done = make_workflow("done", ScaleTier::Small);
        done.complete();
        store.save(&done);
        assert!(store.load().is_none());

        let running = make_workflow("active", ScaleTier::Small);
        store.save(&running);
        assert_eq!(store.load().unwrap().id, running.id);
    }

    #[test]
    fn test_load_by_id_roundtrips_field_for_field() {
        let (mut store, dir) = setup_store();
        let mut wf = make_workflow("roundtrip", ScaleTier::Medium);
        wf.cancel("superseded");
        store.save(&wf);

        // A second store instance at the same path must see the identical record.
        let mut second = StateStore::new(dir.path().join("workflow-state.json"));
        let loaded = second.load_by_id(&wf.id).expect("record must exist on disk");
        assert_eq!(loaded, wf);
    }

    #[test]
    fn test_delete() {
        let (mut store, _dir) = setup_store();
        let wf = make_workflow("doomed", ScaleTier::Quick);
        store.save(&wf);
        assert!(store.delete(&wf.id));
        assert!(!store.delete(&wf.id), "second delete finds nothing");
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_clear_completed_keeps_running() {
        let (mut store, _dir) = setup_store();
        let running = make_workflow("running", ScaleTier::Small);
        store.save(&running);
        for name in ["a", "b"] {
            let mut wf = make_workflow(name, ScaleTier::Quick);
            wf.complete();
            store.save(&wf);
        }
        let mut cancelled = make_workflow("c", ScaleTier::Large);
        cancelled.cancel("nope");
        store.save(&cancelled);

        let outcome = store.clear_completed();
        assert_eq!(outcome, ClearOutcome { cleared: 3, remaining: 1 });
        assert_eq!(store.list_all()[0].id, running.id);
    }

    #[test]
    fn test_stats_counts_by_status_and_scale() {
        let (mut store, _dir) = setup_store();
        store.save(&make_workflow("q", ScaleTier::Quick));
        let mut small = make_workflow("s", ScaleTier::Small);
        small.complete();
        store.save(&small);
        let mut large = make_workflow("l", ScaleTier::Large);
        large.cancel("scope");
        store.save(&large);

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.by_scale[&ScaleTier::Quick], 1);
        assert_eq!(stats.by_scale[&ScaleTier::Medium], 0);
    }

    #[test]
    fn test_export_import_merges_by_id() {
        let (mut store, dir) = setup_store();
        let wf = make_workflow("original", ScaleTier::Quick);
        store.save(&wf);

        let backup = dir.path().join("backup.json");
        assert!(store.export(&backup));

        // New store at a different path; import merges the backed-up record.
        let mut other = StateStore::new(dir.path().join("other-state.json"));
        let outcome = other.import(&backup);
        assert_eq!(outcome.imported, 1);
        assert!(outcome.error.is_none());
        assert_eq!(other.load_by_id(&wf.id).unwrap().name, "original");

        // Importing again adds nothing: the id already exists.
        let outcome = other.import(&backup);
        assert_eq!(outcome.imported, 0);
    }

    #[test]
    fn test_import_invalid_file_degrades() {
        let (mut store, dir) = setup_store();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        let outcome = store.import(&bad);
        assert_eq!(outcome.imported, 0);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_corrupt_state_file_yields_default_document() {
        let (mut store, dir) = setup_store();
        fs::write(dir.path().join("workflow-state.json"), "garbage").unwrap();
        assert!(store.list_all().is_empty());
        // And the store still accepts writes afterwards.
        assert!(store.save(&make_workflow("fresh", ScaleTier::Quick)));
    }

    #[test]
    fn test_reset_empties_document() {
        let (mut store, _dir) = setup_store();
        store.save(&make_workflow("x", ScaleTier::Quick));
        assert!(store.reset());
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_document_metadata_updated_on_write() {
        let (mut store, dir) = setup_store();
        store.save(&make_workflow("meta", ScaleTier::Quick));
        let content = fs::read_to_string(dir.path().join("workflow-state.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["version"], STATE_VERSION);
        assert!(value["last_updated"].is_string());
        assert_eq!(value["workflows"].as_array().unwrap().len(), 1);
    }
}
