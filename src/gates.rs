//! Quality gates: per-phase check registries and the gate runner.
//!
//! Each gate owns a list of named checks. A check is either a built-in
//! function or an external command run through a bounded-timeout process
//! wait; severity (`BLOCK` vs `WARN`) is orthogonal to the check kind.
//! Checks run sequentially in registration order (later checks may assume
//! earlier ones already ran), and a gate passes iff no BLOCK-severity check
//! failed. Command failures (spawn errors, non-zero exits, timeouts) are
//! converted into failed check results rather than propagated, so one
//! misbehaving check never aborts a gate run.
//!
//! The check registry is mutable at runtime (`add_check`/`remove_check`);
//! this is the engine's one extension point for host-supplied validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::RegistryError;
use crate::phase::PhaseId;

/// Default ceiling on external command execution.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Identifier of a gate: one of the five phase gates, or the synthetic
/// end-of-workflow FINAL gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GateId {
    Phase(PhaseId),
    Final,
}

impl GateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateId::Phase(id) => id.as_str(),
            GateId::Final => "FINAL",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("FINAL") {
            Ok(GateId::Final)
        } else {
            Ok(GateId::Phase(s.parse()?))
        }
    }
}

// Gate results are keyed by GateId in persisted JSON maps, so it serializes
// as a plain string ("P".."C" or "FINAL").
impl Serialize for GateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether a failing check blocks phase advancement or is merely reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Block,
    Warn,
}

/// Context handed to built-in check functions.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub cwd: PathBuf,
}

/// What a single check invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub message: String,
}

impl CheckOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Built-in check function.
pub type BuiltinCheck = Arc<dyn Fn(&CheckContext) -> CheckOutcome + Send + Sync>;

/// How a check is executed.
#[derive(Clone)]
pub enum CheckKind {
    /// In-process function; total, returns an outcome value.
    Builtin(BuiltinCheck),
    /// External shell command, waited on with a bounded timeout.
    Command { command: String, timeout: Duration },
}

impl fmt::Debug for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Builtin(_) => f.write_str("Builtin(..)"),
            CheckKind::Command { command, timeout } => f
                .debug_struct("Command")
                .field("command", command)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

/// A named quality check attached to one gate.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub kind: CheckKind,
}

impl Check {
    pub fn builtin(
        name: &str,
        description: &str,
        severity: Severity,
        f: impl Fn(&CheckContext) -> CheckOutcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            severity,
            kind: CheckKind::Builtin(Arc::new(f)),
        }
    }

    pub fn command(name: &str, description: &str, severity: Severity, command: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            severity,
            kind: CheckKind::Command {
                command: command.to_string(),
                timeout: DEFAULT_COMMAND_TIMEOUT,
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let CheckKind::Command { timeout: t, .. } = &mut self.kind {
            *t = timeout;
        }
        self
    }
}

/// Recorded outcome of one check run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated outcome of running every check configured for one gate.
/// `failures` holds failing BLOCK checks, `warnings` failing WARN checks;
/// `passed` is true iff `failures` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateResult {
    pub gate: GateId,
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub failures: Vec<CheckResult>,
    pub warnings: Vec<CheckResult>,
    pub timestamp: DateTime<Utc>,
}

/// Per-gate check counts, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateSummary {
    pub total: usize,
    pub blocking: usize,
    pub warning: usize,
}

/// Owns the per-gate check registry and runs gates.
#[derive(Debug)]
pub struct GateRunner {
    gates: BTreeMap<GateId, Vec<Check>>,
    cwd: PathBuf,
}

impl GateRunner {
    /// A runner with no checks registered. Gates with no checks pass trivially.
    pub fn empty(cwd: impl Into<PathBuf>) -> Self {
        Self {
            gates: BTreeMap::new(),
            cwd: cwd.into(),
        }
    }

    /// A runner preloaded with the built-in check table. The built-ins pass
    /// unconditionally; project-specific lint/test/build commands are
    /// registered on top from configuration.
    pub fn with_defaults(cwd: impl Into<PathBuf>) -> Self {
        let mut runner = Self::empty(cwd);
        for (gate, check) in default_checks() {
            runner.add_check(gate, check);
        }
        runner
    }

    pub fn checks_for(&self, gate: GateId) -> &[Check] {
        self.gates.get(&gate).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register a check at the end of a gate's list.
    pub fn add_check(&mut self, gate: GateId, check: Check) {
        self.gates.entry(gate).or_default().push(check);
    }

    /// Remove a check by name. Returns whether anything was removed.
    pub fn remove_check(&mut self, gate: GateId, name: &str) -> bool {
        let Some(checks) = self.gates.get_mut(&gate) else {
            return false;
        };
        let before = checks.len();
        checks.retain(|c| c.name != name);
        checks.len() != before
    }

    /// Run one check, converting every execution failure into a failed result.
    pub async fn run_check(&self, check: &Check) -> CheckResult {
        let outcome = match &check.kind {
            CheckKind::Builtin(f) => f(&CheckContext {
                cwd: self.cwd.clone(),
            }),
            CheckKind::Command { command, timeout } => {
                run_command(command, *timeout, &self.cwd).await
            }
        };
        CheckResult {
            name: check.name.clone(),
            description: check.description.clone(),
            severity: check.severity,
            passed: outcome.passed,
            message: outcome.message,
            timestamp: Utc::now(),
        }
    }

    /// Run every check for a gate sequentially and aggregate the results.
    pub async fn run_gate(&self, gate: GateId) -> QualityGateResult {
        let mut checks = Vec::new();
        for check in self.checks_for(gate) {
            let result = self.run_check(check).await;
            if !result.passed {
                tracing::debug!(gate = %gate, check = %result.name, "check failed: {}", result.message);
            }
            checks.push(result);
        }

        let failures: Vec<CheckResult> = checks
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Block)
            .cloned()
            .collect();
        let warnings: Vec<CheckResult> = checks
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Warn)
            .cloned()
            .collect();

        QualityGateResult {
            gate,
            passed: failures.is_empty(),
            checks,
            failures,
            warnings,
            timestamp: Utc::now(),
        }
    }

    /// Check counts per gate.
    pub fn summary(&self) -> BTreeMap<GateId, GateSummary> {
        self.gates
            .iter()
            .map(|(gate, checks)| {
                let blocking = checks
                    .iter()
                    .filter(|c| c.severity == Severity::Block)
                    .count();
                (
                    *gate,
                    GateSummary {
                        total: checks.len(),
                        blocking,
                        warning: checks.len() - blocking,
                    },
                )
            })
            .collect()
    }
}

/// Run a shell command, bounded by `timeout`. Never returns an error: spawn
/// failures, non-zero exits, and timeouts all become failed outcomes.
async fn run_command(command: &str, timeout: Duration, cwd: &Path) -> CheckOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => return CheckOutcome::fail(format!("Failed to spawn '{command}': {err}")),
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => CheckOutcome::fail(format!(
            "'{command}' timed out after {}s",
            timeout.as_secs()
        )),
        Ok(Err(err)) => CheckOutcome::fail(format!("Failed to wait for '{command}': {err}")),
        Ok(Ok(output)) if output.status.success() => {
            CheckOutcome::pass(format!("'{command}' succeeded"))
        }
        Ok(Ok(output)) => CheckOutcome::fail(format!(
            "'{command}' exited with code {}",
            output.status.code().unwrap_or(-1)
        )),
    }
}

/// The built-in check table, mirrored per phase plus FINAL.
fn default_checks() -> Vec<(GateId, Check)> {
    use GateId::{Final, Phase};
    use PhaseId::{C, E, P, R, V};

    vec![
        (
            Phase(P),
            Check::builtin(
                "requirements-defined",
                "Requirements are documented",
                Severity::Block,
                |_| CheckOutcome::pass("Requirements defined"),
            ),
        ),
        (
            Phase(R),
            Check::builtin(
                "architecture-reviewed",
                "Architecture has been reviewed",
                Severity::Block,
                |_| CheckOutcome::pass("Architecture reviewed"),
            ),
        ),
        (
            Phase(E),
            Check::builtin(
                "code-compiled",
                "Code compiles without errors",
                Severity::Block,
                |_| CheckOutcome::pass("Code compiles"),
            ),
        ),
        (
            Phase(E),
            Check::builtin(
                "tests-written",
                "Tests have been written",
                Severity::Warn,
                |_| CheckOutcome::pass("Tests written"),
            ),
        ),
        (
            Phase(V),
            Check::builtin(
                "coverage-maintained",
                "Test coverage has not decreased",
                Severity::Warn,
                |_| CheckOutcome::pass("Coverage maintained"),
            ),
        ),
        (
            Phase(V),
            Check::builtin(
                "no-regressions",
                "No regressions introduced",
                Severity::Block,
                |_| CheckOutcome::pass("No regressions"),
            ),
        ),
        (
            Phase(C),
            Check::builtin(
                "changelog-updated",
                "Changelog has been updated",
                Severity::Warn,
                |_| CheckOutcome::pass("Changelog updated"),
            ),
        ),
        (
            Final,
            Check::builtin(
                "all-gates-passed",
                "All phase gates have passed",
                Severity::Block,
                |_| CheckOutcome::pass("All gates passed"),
            ),
        ),
        (
            Final,
            Check::builtin(
                "artifacts-generated",
                "All required artifacts are generated",
                Severity::Block,
                |_| CheckOutcome::pass("Artifacts generated"),
            ),
        ),
    ]
}
