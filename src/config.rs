//! Configuration for the Cadence engine, read from `.cadence/cadence.toml`.
//!
//! Everything here is data, not code: a host project can reshape the scale
//! tier table and attach its own command checks to any gate without touching
//! engine logic. Missing file means built-in defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [engine]
//! state_file = ".cadence/workflow-state.json"
//!
//! [scales.QUICK]
//! phases = ["E", "V"]
//! estimated_minutes = 5
//! description = "Bug fixes, typos, small tweaks"
//! keywords = ["fix", "typo", "correct", "update", "patch"]
//! max_files = 3
//! max_lines = 50
//!
//! [[checks.V]]
//! name = "tests-passing"
//! description = "All tests pass"
//! severity = "BLOCK"
//! command = "cargo test"
//! timeout_secs = 600
//!
//! [[checks.FINAL]]
//! name = "build-successful"
//! description = "Release build completes"
//! severity = "WARN"
//! command = "cargo build --release"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::WorkflowEngine;
use crate::gates::{Check, GateId, GateRunner, Severity};
use crate::phase::PhaseRegistry;
use crate::scale::{HeuristicRouter, ScaleProfile, ScaleTier, builtin_profiles};
use crate::state::StateStore;

pub const CONFIG_DIR: &str = ".cadence";
pub const CONFIG_FILE: &str = "cadence.toml";
pub const DEFAULT_STATE_FILE: &str = "workflow-state.json";

/// Raw `cadence.toml` contents.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineSection,
    /// Scale profile overrides, keyed by tier name.
    #[serde(default)]
    scales: BTreeMap<String, ScaleProfile>,
    /// Command checks to register, keyed by gate name ("P".."C" or "FINAL").
    #[serde(default)]
    checks: BTreeMap<String, Vec<CheckConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EngineSection {
    /// State file path, relative to the project directory unless absolute.
    #[serde(default)]
    state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct CheckConfig {
    name: String,
    #[serde(default)]
    description: String,
    /// Custom checks default to advisory unless declared blocking.
    #[serde(default = "default_severity")]
    severity: Severity,
    command: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

fn default_severity() -> Severity {
    Severity::Warn
}

/// Resolved configuration: tier table, command checks, and paths.
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    pub project_dir: PathBuf,
    pub state_file: PathBuf,
    pub profiles: BTreeMap<ScaleTier, ScaleProfile>,
    checks: Vec<(GateId, Check)>,
}

impl CadenceConfig {
    /// Load `.cadence/cadence.toml` under `project_dir`, falling back to
    /// built-in defaults when the file does not exist.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);
        let file = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            toml::from_str::<ConfigFile>(&content)
                .with_context(|| format!("Failed to parse config: {}", config_path.display()))?
        } else {
            ConfigFile::default()
        };

        let mut profiles = builtin_profiles();
        for (tier_name, profile) in file.scales {
            let tier: ScaleTier = tier_name
                .parse()
                .with_context(|| format!("Invalid scale tier in config: {tier_name}"))?;
            profiles.insert(tier, profile);
        }

        let mut checks = Vec::new();
        for (gate_name, configs) in file.checks {
            let gate: GateId = gate_name
                .parse()
                .with_context(|| format!("Invalid gate in config: {gate_name}"))?;
            for config in configs {
                let mut check = Check::command(
                    &config.name,
                    &config.description,
                    config.severity,
                    &config.command,
                );
                if let Some(secs) = config.timeout_secs {
                    check = check.with_timeout(Duration::from_secs(secs));
                }
                checks.push((gate, check));
            }
        }

        let state_file = match file.engine.state_file {
            Some(path) if path.is_absolute() => path,
            Some(path) => project_dir.join(path),
            None => project_dir.join(CONFIG_DIR).join(DEFAULT_STATE_FILE),
        };

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            state_file,
            profiles,
            checks,
        })
    }

    /// Build an engine from this configuration: registry and router share the
    /// resolved tier table, and configured command checks are registered on
    /// top of the built-in gate table.
    pub fn build_engine(&self) -> Result<WorkflowEngine> {
        let registry = PhaseRegistry::from_profiles(&self.profiles)?;
        let router = HeuristicRouter::new(self.profiles.clone());
        let mut gates = GateRunner::with_defaults(&self.project_dir);
        for (gate, check) in &self.checks {
            gates.add_check(*gate, check.clone());
        }
        Ok(WorkflowEngine::new(
            registry,
            Box::new(router),
            gates,
            StateStore::new(&self.state_file),
        ))
    }
}
