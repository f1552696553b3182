//! PREVC phase definitions and sequence queries.
//!
//! This module provides:
//! - `PhaseId` — the five phase identifiers (Plan, Review, Execute, Validate, Confirm)
//! - `PhaseInfo` — static per-phase metadata (roles, expected outputs)
//! - `PhaseRegistry` — per-scale phase sequences with neighbor, progress, and
//!   transition queries
//!
//! Phases are configuration data, not state: the five `PhaseInfo` records never
//! change at runtime. Only the per-scale sequence table can be customized, and a
//! custom table must keep every sequence a strictly-ordered subsequence of
//! `P → R → E → V → C`.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::RegistryError;
use crate::scale::{ScaleProfile, ScaleTier, builtin_profiles};

/// Identifier of a single PREVC phase.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PhaseId {
    P,
    R,
    E,
    V,
    C,
}

impl PhaseId {
    /// The canonical full sequence. Every scale's sequence is an ordered
    /// subsequence of this.
    pub const CANONICAL: [PhaseId; 5] =
        [PhaseId::P, PhaseId::R, PhaseId::E, PhaseId::V, PhaseId::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseId::P => "P",
            PhaseId::R => "R",
            PhaseId::E => "E",
            PhaseId::V => "V",
            PhaseId::C => "C",
        }
    }

    /// Position in the canonical sequence.
    fn canonical_index(&self) -> usize {
        match self {
            PhaseId::P => 0,
            PhaseId::R => 1,
            PhaseId::E => 2,
            PhaseId::V => 3,
            PhaseId::C => 4,
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "P" => Ok(PhaseId::P),
            "R" => Ok(PhaseId::R),
            "E" => Ok(PhaseId::E),
            "V" => Ok(PhaseId::V),
            "C" => Ok(PhaseId::C),
            _ => Err(RegistryError::UnknownPhase(s.to_string())),
        }
    }
}

/// Static description of one phase: what it is for, who is responsible, and
/// what it is expected to produce.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInfo {
    pub id: PhaseId,
    pub name: &'static str,
    pub description: &'static str,
    /// Responsible-role tags, used by front-ends to suggest reviewers/agents.
    pub roles: &'static [&'static str],
    /// Expected output labels for the phase.
    pub outputs: &'static [&'static str],
}

static PHASES: [PhaseInfo; 5] = [
    PhaseInfo {
        id: PhaseId::P,
        name: "Plan",
        description: "Define what to build. Gather requirements, write specs, identify scope.",
        roles: &["orchestrator", "pm", "po", "sm", "analyst"],
        outputs: &["PRD", "Specifications", "Stories", "Epic breakdown"],
    },
    PhaseInfo {
        id: PhaseId::R,
        name: "Review",
        description:
            "Validate the approach. Architecture decisions, technical design, risk assessment.",
        roles: &["architect", "security", "reviewer", "optimizer"],
        outputs: &["Architecture Doc", "ADR", "Security Review", "Performance Plan"],
    },
    PhaseInfo {
        id: PhaseId::E,
        name: "Execute",
        description: "Build it. Implementation follows the approved specs and design.",
        roles: &["developer", "data-engineer", "mobile"],
        outputs: &["Code", "Tests", "Migrations", "Documentation"],
    },
    PhaseInfo {
        id: PhaseId::V,
        name: "Validate",
        description: "Verify it works. Tests, QA, code review against original specs.",
        roles: &["qa", "reviewer", "security", "optimizer"],
        outputs: &["QA Report", "Coverage Report", "Benchmarks", "Security Scan"],
    },
    PhaseInfo {
        id: PhaseId::C,
        name: "Confirm",
        description: "Ship it. Documentation, deployment, stakeholder handoff.",
        roles: &["devops", "writer"],
        outputs: &["Release", "Changelog", "Deployed App", "Updated Docs"],
    },
];

/// All five phases in canonical order.
pub fn all_phases() -> &'static [PhaseInfo] {
    &PHASES
}

/// 1-based position within a scale's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Progress {
    /// Build from a 1-based position and a non-zero total.
    pub fn of(current: usize, total: usize) -> Self {
        let percentage = ((current as f64 / total as f64) * 100.0).round() as u32;
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// Outcome of `validate_transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionCheck {
    pub valid: bool,
    pub reason: Option<&'static str>,
}

/// Display status of one phase in a scale's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineStatus {
    Completed,
    Current,
    Pending,
}

#[derive(Debug, Clone, Copy)]
pub struct TimelineEntry {
    pub phase: &'static PhaseInfo,
    pub status: TimelineStatus,
}

/// Per-scale phase sequences with lookup, neighbor, and progress queries.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    sequences: BTreeMap<ScaleTier, Vec<PhaseId>>,
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        let sequences = builtin_profiles()
            .into_iter()
            .map(|(tier, profile)| (tier, profile.phases))
            .collect();
        Self { sequences }
    }
}

impl PhaseRegistry {
    /// Build a registry from a (possibly customized) profile table, enforcing
    /// the subsequence invariant on every tier.
    pub fn from_profiles(profiles: &BTreeMap<ScaleTier, ScaleProfile>) -> Result<Self> {
        let mut sequences = BTreeMap::new();
        for (tier, profile) in profiles {
            validate_sequence(*tier, &profile.phases)?;
            sequences.insert(*tier, profile.phases.clone());
        }
        Ok(Self { sequences })
    }

    /// Static metadata for a phase.
    pub fn phase_info(&self, id: PhaseId) -> &'static PhaseInfo {
        &PHASES[id.canonical_index()]
    }

    /// The ordered phase identifiers for a scale.
    pub fn sequence_ids(&self, scale: ScaleTier) -> Result<&[PhaseId], RegistryError> {
        self.sequences
            .get(&scale)
            .map(Vec::as_slice)
            .ok_or_else(|| RegistryError::UnknownScale(scale.to_string()))
    }

    /// The ordered phase metadata for a scale.
    pub fn sequence(&self, scale: ScaleTier) -> Result<Vec<&'static PhaseInfo>, RegistryError> {
        Ok(self
            .sequence_ids(scale)?
            .iter()
            .map(|id| self.phase_info(*id))
            .collect())
    }

    fn position(&self, current: PhaseId, scale: ScaleTier) -> Result<usize, RegistryError> {
        self.sequence_ids(scale)?
            .iter()
            .position(|id| *id == current)
            .ok_or_else(|| RegistryError::PhaseNotInSequence {
                phase: current.to_string(),
                scale: scale.to_string(),
            })
    }

    /// The phase after `current` in the scale's sequence, or `None` at the end.
    pub fn next_phase(
        &self,
        current: PhaseId,
        scale: ScaleTier,
    ) -> Result<Option<&'static PhaseInfo>, RegistryError> {
        let index = self.position(current, scale)?;
        let sequence = self.sequence_ids(scale)?;
        Ok(sequence.get(index + 1).map(|id| self.phase_info(*id)))
    }

    /// The phase before `current` in the scale's sequence, or `None` at the start.
    pub fn previous_phase(
        &self,
        current: PhaseId,
        scale: ScaleTier,
    ) -> Result<Option<&'static PhaseInfo>, RegistryError> {
        let index = self.position(current, scale)?;
        if index == 0 {
            return Ok(None);
        }
        let sequence = self.sequence_ids(scale)?;
        Ok(Some(self.phase_info(sequence[index - 1])))
    }

    /// Whether a phase belongs to a scale's sequence.
    pub fn is_phase_in_scale(&self, id: PhaseId, scale: ScaleTier) -> bool {
        self.sequences
            .get(&scale)
            .is_some_and(|seq| seq.contains(&id))
    }

    /// 1-based progress of `current` within the scale's sequence.
    pub fn progress(&self, current: PhaseId, scale: ScaleTier) -> Result<Progress, RegistryError> {
        let index = self.position(current, scale)?;
        let total = self.sequence_ids(scale)?.len();
        Ok(Progress::of(index + 1, total))
    }

    /// A transition is valid only when both phases belong to the sequence and
    /// `to` is exactly one position after `from`. No skipping, no going back;
    /// force-overrides are an engine-level concern, not a registry one.
    pub fn validate_transition(
        &self,
        from: PhaseId,
        to: PhaseId,
        scale: ScaleTier,
    ) -> TransitionCheck {
        let Ok(sequence) = self.sequence_ids(scale) else {
            return TransitionCheck {
                valid: false,
                reason: Some("Unknown scale"),
            };
        };
        let from_index = sequence.iter().position(|id| *id == from);
        let to_index = sequence.iter().position(|id| *id == to);
        match (from_index, to_index) {
            (Some(f), Some(t)) if t == f + 1 => TransitionCheck {
                valid: true,
                reason: None,
            },
            (Some(_), Some(_)) => TransitionCheck {
                valid: false,
                reason: Some("Can only advance to next phase in sequence"),
            },
            _ => TransitionCheck {
                valid: false,
                reason: Some("One or both phases not in sequence"),
            },
        }
    }

    /// Per-phase completed/current/pending view of a scale's sequence.
    pub fn timeline(
        &self,
        current: PhaseId,
        scale: ScaleTier,
    ) -> Result<Vec<TimelineEntry>, RegistryError> {
        let position = self.position(current, scale)?;
        Ok(self
            .sequence_ids(scale)?
            .iter()
            .enumerate()
            .map(|(index, id)| TimelineEntry {
                phase: self.phase_info(*id),
                status: match index.cmp(&position) {
                    std::cmp::Ordering::Less => TimelineStatus::Completed,
                    std::cmp::Ordering::Equal => TimelineStatus::Current,
                    std::cmp::Ordering::Greater => TimelineStatus::Pending,
                },
            })
            .collect())
    }
}

/// Reject phase lists that repeat, reorder, or run outside the canonical
/// P → R → E → V → C order.
fn validate_sequence(tier: ScaleTier, phases: &[PhaseId]) -> Result<()> {
    if phases.is_empty() {
        bail!("Scale {tier} has an empty phase sequence");
    }
    for pair in phases.windows(2) {
        if pair[1].canonical_index() <= pair[0].canonical_index() {
            bail!(
                "Scale {tier} phase sequence must be a strictly-ordered subsequence of P,R,E,V,C (got {} before {})",
                pair[0],
                pair[1]
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PhaseRegistry {
        PhaseRegistry::default()
    }

    #[test]
    fn test_phase_id_parse_roundtrip() {
        for id in PhaseId::CANONICAL {
            assert_eq!(id.as_str().parse::<PhaseId>().unwrap(), id);
        }
        assert_eq!("p".parse::<PhaseId>().unwrap(), PhaseId::P);
    }

    #[test]
    fn test_phase_id_parse_unknown() {
        let err = "X".parse::<PhaseId>().unwrap_err();
        assert_eq!(err, RegistryError::UnknownPhase("X".to_string()));
    }

    #[test]
    fn test_all_phases_canonical_order() {
        let ids: Vec<PhaseId> = all_phases().iter().map(|p| p.id).collect();
        assert_eq!(ids, PhaseId::CANONICAL);
    }

    #[test]
    fn test_phase_info_lookup() {
        let reg = registry();
        assert_eq!(reg.phase_info(PhaseId::P).name, "Plan");
        assert_eq!(reg.phase_info(PhaseId::C).name, "Confirm");
        assert!(reg.phase_info(PhaseId::E).roles.contains(&"developer"));
    }

    #[test]
    fn test_builtin_sequences() {
        let reg = registry();
        assert_eq!(
            reg.sequence_ids(ScaleTier::Quick).unwrap(),
            &[PhaseId::E, PhaseId::V]
        );
        assert_eq!(
            reg.sequence_ids(ScaleTier::Small).unwrap(),
            &[PhaseId::P, PhaseId::E, PhaseId::V]
        );
        assert_eq!(
            reg.sequence_ids(ScaleTier::Medium).unwrap(),
            &[PhaseId::P, PhaseId::R, PhaseId::E, PhaseId::V]
        );
        assert_eq!(reg.sequence_ids(ScaleTier::Large).unwrap(), &PhaseId::CANONICAL);
    }

    #[test]
    fn test_every_sequence_is_strict_subsequence_of_canonical() {
        let reg = registry();
        for tier in ScaleTier::ALL {
            let seq = reg.sequence_ids(tier).unwrap();
            assert!(!seq.is_empty(), "{tier} sequence must be non-empty");
            for pair in seq.windows(2) {
                assert!(
                    pair[0].canonical_index() < pair[1].canonical_index(),
                    "{tier} sequence out of canonical order"
                );
            }
        }
    }

    #[test]
    fn test_next_phase() {
        let reg = registry();
        let next = reg.next_phase(PhaseId::P, ScaleTier::Small).unwrap();
        assert_eq!(next.unwrap().id, PhaseId::E);

        // Last phase has no successor
        let next = reg.next_phase(PhaseId::V, ScaleTier::Small).unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn test_next_phase_not_in_sequence() {
        let err = registry()
            .next_phase(PhaseId::C, ScaleTier::Quick)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::PhaseNotInSequence {
                phase: "C".to_string(),
                scale: "QUICK".to_string(),
            }
        );
    }

    #[test]
    fn test_previous_phase() {
        let reg = registry();
        let prev = reg.previous_phase(PhaseId::V, ScaleTier::Quick).unwrap();
        assert_eq!(prev.unwrap().id, PhaseId::E);

        let prev = reg.previous_phase(PhaseId::E, ScaleTier::Quick).unwrap();
        assert!(prev.is_none());
    }

    #[test]
    fn test_progress_small_scale() {
        let reg = registry();
        let p = reg.progress(PhaseId::P, ScaleTier::Small).unwrap();
        assert_eq!((p.current, p.total, p.percentage), (1, 3, 33));
        let p = reg.progress(PhaseId::E, ScaleTier::Small).unwrap();
        assert_eq!((p.current, p.total, p.percentage), (2, 3, 67));
        let p = reg.progress(PhaseId::V, ScaleTier::Small).unwrap();
        assert_eq!((p.current, p.total, p.percentage), (3, 3, 100));
    }

    #[test]
    fn test_validate_transition() {
        let reg = registry();
        assert!(
            reg.validate_transition(PhaseId::P, PhaseId::R, ScaleTier::Medium)
                .valid
        );
        // Skipping
        let check = reg.validate_transition(PhaseId::P, PhaseId::E, ScaleTier::Medium);
        assert!(!check.valid);
        assert_eq!(check.reason, Some("Can only advance to next phase in sequence"));
        // Backward
        assert!(
            !reg.validate_transition(PhaseId::E, PhaseId::P, ScaleTier::Medium)
                .valid
        );
        // Outside the sequence
        let check = reg.validate_transition(PhaseId::P, PhaseId::C, ScaleTier::Quick);
        assert!(!check.valid);
        assert_eq!(check.reason, Some("One or both phases not in sequence"));
    }

    #[test]
    fn test_timeline_statuses() {
        let reg = registry();
        let timeline = reg.timeline(PhaseId::E, ScaleTier::Medium).unwrap();
        let statuses: Vec<TimelineStatus> = timeline.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                TimelineStatus::Completed,
                TimelineStatus::Completed,
                TimelineStatus::Current,
                TimelineStatus::Pending,
            ]
        );
    }

    #[test]
    fn test_from_profiles_rejects_out_of_order_sequence() {
        let mut profiles = builtin_profiles();
        profiles.get_mut(&ScaleTier::Quick).unwrap().phases = vec![PhaseId::V, PhaseId::E];
        let err = PhaseRegistry::from_profiles(&profiles).unwrap_err();
        assert!(err.to_string().contains("strictly-ordered"));
    }

    #[test]
    fn test_from_profiles_rejects_empty_sequence() {
        let mut profiles = builtin_profiles();
        profiles.get_mut(&ScaleTier::Quick).unwrap().phases = vec![];
        assert!(PhaseRegistry::from_profiles(&profiles).is_err());
    }

    #[test]
    fn test_from_profiles_rejects_repeats() {
        let mut profiles = builtin_profiles();
        profiles.get_mut(&ScaleTier::Quick).unwrap().phases = vec![PhaseId::E, PhaseId::E];
        assert!(PhaseRegistry::from_profiles(&profiles).is_err());
    }
}
