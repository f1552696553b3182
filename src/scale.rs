//! Scale tiers and request routing.
//!
//! This module provides:
//! - `ScaleTier` — the four work-size buckets (QUICK/SMALL/MEDIUM/LARGE)
//! - `ScaleProfile` — per-tier phase list, time estimate, and heuristic indicators
//! - `ScaleClassifier` — the routing strategy trait
//! - `HeuristicRouter` — the default keyword/threshold classifier
//!
//! Routing is an ordered-fallback heuristic, not a learned model: explicit tier,
//! then description keywords, then change-size thresholds, then MEDIUM. The only
//! guarantee is determinism.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::RegistryError;
use crate::phase::PhaseId;

/// Work-size bucket selecting which PREVC phases a unit of work goes through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScaleTier {
    Quick,
    Small,
    Medium,
    Large,
}

impl ScaleTier {
    /// All tiers, smallest first.
    pub const ALL: [ScaleTier; 4] = [
        ScaleTier::Quick,
        ScaleTier::Small,
        ScaleTier::Medium,
        ScaleTier::Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleTier::Quick => "QUICK",
            ScaleTier::Small => "SMALL",
            ScaleTier::Medium => "MEDIUM",
            ScaleTier::Large => "LARGE",
        }
    }
}

impl fmt::Display for ScaleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleTier {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "QUICK" => Ok(ScaleTier::Quick),
            "SMALL" => Ok(ScaleTier::Small),
            "MEDIUM" => Ok(ScaleTier::Medium),
            "LARGE" => Ok(ScaleTier::Large),
            _ => Err(RegistryError::UnknownScale(s.to_string())),
        }
    }
}

/// Per-tier routing configuration: phase list plus the heuristic indicators
/// the router matches requests against. Profiles are data, loaded from
/// `cadence.toml` when the host overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleProfile {
    /// Ordered phase identifiers for this tier.
    pub phases: Vec<PhaseId>,
    /// Rough wall-clock estimate in minutes.
    pub estimated_minutes: u32,
    /// Human description of what belongs in this tier.
    pub description: String,
    /// Keywords that vote for this tier during description scanning.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Change-size ceiling: file count. `None` means unbounded.
    #[serde(default)]
    pub max_files: Option<usize>,
    /// Change-size ceiling: total changed lines. `None` means unbounded.
    #[serde(default)]
    pub max_lines: Option<usize>,
}

/// The built-in tier table.
pub fn builtin_profiles() -> BTreeMap<ScaleTier, ScaleProfile> {
    use PhaseId::{C, E, P, R, V};

    let mut profiles = BTreeMap::new();
    profiles.insert(
        ScaleTier::Quick,
        ScaleProfile {
            phases: vec![E, V],
            estimated_minutes: 5,
            description: "Bug fixes, typos, small tweaks".to_string(),
            keywords: ["fix", "typo", "correct", "update", "patch"]
                .map(String::from)
                .to_vec(),
            max_files: Some(3),
            max_lines: Some(50),
        },
    );
    profiles.insert(
        ScaleTier::Small,
        ScaleProfile {
            phases: vec![P, E, V],
            estimated_minutes: 15,
            description: "Simple features, no architecture changes".to_string(),
            keywords: ["add", "create", "implement", "update", "feature"]
                .map(String::from)
                .to_vec(),
            max_files: Some(10),
            max_lines: Some(200),
        },
    );
    profiles.insert(
        ScaleTier::Medium,
        ScaleProfile {
            phases: vec![P, R, E, V],
            estimated_minutes: 30,
            description: "Regular features with design decisions".to_string(),
            keywords: ["feature", "refactor", "integrate", "migrate"]
                .map(String::from)
                .to_vec(),
            max_files: Some(30),
            max_lines: Some(1000),
        },
    );
    profiles.insert(
        ScaleTier::Large,
        ScaleProfile {
            phases: vec![P, R, E, V, C],
            estimated_minutes: 60,
            description: "Complex features, systems, compliance".to_string(),
            keywords: [
                "system",
                "architecture",
                "redesign",
                "migrate",
                "compliance",
                "security",
            ]
            .map(String::from)
            .to_vec(),
            max_files: None,
            max_lines: None,
        },
    );
    profiles
}

/// File/line-count summary of a proposed change, used for threshold routing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub files: usize,
    pub lines: usize,
}

/// An unstructured routing request. All fields optional; resolution order is
/// explicit tier, then description, then change summary, then MEDIUM.
#[derive(Debug, Clone, Default)]
pub struct ScaleRequest {
    pub scale: Option<ScaleTier>,
    pub description: Option<String>,
    pub changes: Option<ChangeSummary>,
}

/// A resolved tier together with the reasons it was chosen.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleRecommendation {
    pub scale: ScaleTier,
    pub phases: Vec<PhaseId>,
    pub estimated_minutes: u32,
    pub description: String,
    pub reasons: Vec<String>,
}

/// Routing strategy. `HeuristicRouter` is the default implementation; hosts
/// may substitute their own without touching the engine.
pub trait ScaleClassifier: Send + Sync {
    /// Resolve a request to exactly one tier.
    fn classify(&self, request: &ScaleRequest) -> ScaleTier;

    /// Resolve a request and explain the choice.
    fn recommend(&self, request: &ScaleRequest) -> ScaleRecommendation;
}

/// Default keyword/threshold classifier over a `ScaleProfile` table.
#[derive(Debug, Clone)]
pub struct HeuristicRouter {
    profiles: BTreeMap<ScaleTier, ScaleProfile>,
}

impl Default for HeuristicRouter {
    fn default() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }
}

impl HeuristicRouter {
    pub fn new(profiles: BTreeMap<ScaleTier, ScaleProfile>) -> Self {
        Self { profiles }
    }

    pub fn profile(&self, scale: ScaleTier) -> Result<&ScaleProfile, RegistryError> {
        self.profiles
            .get(&scale)
            .ok_or_else(|| RegistryError::UnknownScale(scale.to_string()))
    }

    pub fn profiles(&self) -> &BTreeMap<ScaleTier, ScaleProfile> {
        &self.profiles
    }

    /// Estimated minutes for a tier, if the tier is configured.
    pub fn estimate_minutes(&self, scale: ScaleTier) -> Option<u32> {
        self.profiles.get(&scale).map(|p| p.estimated_minutes)
    }

    fn keywords_match(&self, scale: ScaleTier, text: &str) -> bool {
        self.profiles
            .get(&scale)
            .map(|p| p.keywords.iter().any(|kw| text.contains(kw.as_str())))
            .unwrap_or(false)
    }

    /// Scan free text for tier keywords. Tie-break order is LARGE, QUICK,
    /// SMALL, MEDIUM, each gated by a secondary sanity constraint.
    fn detect_from_description(&self, description: &str) -> Option<ScaleTier> {
        let text = description.to_lowercase();

        if self.keywords_match(ScaleTier::Large, &text) {
            let architectural = ["system", "architecture", "redesign", "compliance"]
                .iter()
                .any(|w| text.contains(w));
            if architectural {
                return Some(ScaleTier::Large);
            }
        }

        if self.keywords_match(ScaleTier::Quick, &text) {
            // A genuinely quick request is short and single-clause.
            if text.len() < 100 && !text.contains("and") && !text.contains("also") {
                return Some(ScaleTier::Quick);
            }
        }

        if self.keywords_match(ScaleTier::Small, &text)
            && !text.contains("complex")
            && !text.contains("multiple")
        {
            return Some(ScaleTier::Small);
        }

        if self.keywords_match(ScaleTier::Medium, &text) {
            return Some(ScaleTier::Medium);
        }

        None
    }

    /// Compare a change summary against tier ceilings, smallest tier first.
    fn detect_from_changes(&self, changes: ChangeSummary) -> ScaleTier {
        for tier in [ScaleTier::Quick, ScaleTier::Small, ScaleTier::Medium] {
            let Some(profile) = self.profiles.get(&tier) else {
                continue;
            };
            let files_ok = profile.max_files.is_none_or(|max| changes.files <= max);
            let lines_ok = profile.max_lines.is_none_or(|max| changes.lines <= max);
            if files_ok && lines_ok {
                return tier;
            }
        }
        ScaleTier::Large
    }
}

impl ScaleClassifier for HeuristicRouter {
    fn classify(&self, request: &ScaleRequest) -> ScaleTier {
        if let Some(scale) = request.scale
            && self.profiles.contains_key(&scale)
        {
            return scale;
        }

        if let Some(ref description) = request.description
            && let Some(detected) = self.detect_from_description(description)
        {
            tracing::debug!(scale = %detected, "scale detected from description");
            return detected;
        }

        if let Some(changes) = request.changes
            && (changes.files > 0 || changes.lines > 0)
        {
            let detected = self.detect_from_changes(changes);
            tracing::debug!(scale = %detected, files = changes.files, "scale detected from change summary");
            return detected;
        }

        ScaleTier::Medium
    }

    fn recommend(&self, request: &ScaleRequest) -> ScaleRecommendation {
        let scale = self.classify(request);
        let profile = self.profiles.get(&scale).cloned().unwrap_or_else(|| {
            // classify() only returns configured tiers or MEDIUM; a missing
            // MEDIUM profile would be a broken custom table.
            builtin_profiles().remove(&scale).expect("builtin tier")
        });

        let mut reasons = Vec::new();
        if request.scale.is_some() {
            reasons.push(format!("Explicitly set to {scale}"));
        } else if let Some(ref description) = request.description
            && self.detect_from_description(description).is_some()
        {
            let snippet: String = description.chars().take(50).collect();
            reasons.push(format!("Detected from description: \"{snippet}...\""));
        }
        if let Some(changes) = request.changes
            && (changes.files > 0 || changes.lines > 0)
        {
            reasons.push(format!(
                "Based on {} file(s), {} changed line(s)",
                changes.files, changes.lines
            ));
        }
        if reasons.is_empty() {
            reasons.push("Default scale (MEDIUM)".to_string());
        }

        ScaleRecommendation {
            scale,
            phases: profile.phases.clone(),
            estimated_minutes: profile.estimated_minutes,
            description: profile.description.clone(),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> HeuristicRouter {
        HeuristicRouter::default()
    }

    #[test]
    fn test_scale_tier_parse_roundtrip() {
        for tier in ScaleTier::ALL {
            let parsed: ScaleTier = tier.as_str().parse().unwrap();
            assert_eq!(parsed, tier);
        }
        // Case-insensitive
        assert_eq!("quick".parse::<ScaleTier>().unwrap(), ScaleTier::Quick);
    }

    #[test]
    fn test_scale_tier_parse_unknown() {
        let err = "ENORMOUS".parse::<ScaleTier>().unwrap_err();
        assert_eq!(err, RegistryError::UnknownScale("ENORMOUS".to_string()));
    }

    #[test]
    fn test_explicit_scale_wins() {
        let request = ScaleRequest {
            scale: Some(ScaleTier::Large),
            description: Some("fix typo".to_string()),
            changes: Some(ChangeSummary { files: 1, lines: 2 }),
        };
        assert_eq!(router().classify(&request), ScaleTier::Large);
    }

    #[test]
    fn test_detect_large_needs_architectural_wording() {
        let request = ScaleRequest {
            description: Some("redesign the authentication architecture".to_string()),
            ..Default::default()
        };
        assert_eq!(router().classify(&request), ScaleTier::Large);

        // "security" is a LARGE keyword but without system/architecture wording
        // the LARGE branch does not fire; "patch" then matches QUICK.
        let request = ScaleRequest {
            description: Some("security patch".to_string()),
            ..Default::default()
        };
        assert_eq!(router().classify(&request), ScaleTier::Quick);
    }

    #[test]
    fn test_detect_quick_rejects_conjunctions() {
        let request = ScaleRequest {
            description: Some("fix the typo".to_string()),
            ..Default::default()
        };
        assert_eq!(router().classify(&request), ScaleTier::Quick);

        let request = ScaleRequest {
            description: Some("fix the typo and also the header".to_string()),
            ..Default::default()
        };
        assert_ne!(router().classify(&request), ScaleTier::Quick);
    }

    #[test]
    fn test_detect_small_rejects_complexity_words() {
        let request = ScaleRequest {
            description: Some("implement a complex caching layer".to_string()),
            ..Default::default()
        };
        assert_ne!(router().classify(&request), ScaleTier::Small);
    }

    #[test]
    fn test_detect_from_changes_thresholds() {
        let r = router();
        let quick = ScaleRequest {
            changes: Some(ChangeSummary { files: 2, lines: 40 }),
            ..Default::default()
        };
        assert_eq!(r.classify(&quick), ScaleTier::Quick);

        let small = ScaleRequest {
            changes: Some(ChangeSummary { files: 8, lines: 150 }),
            ..Default::default()
        };
        assert_eq!(r.classify(&small), ScaleTier::Small);

        let medium = ScaleRequest {
            changes: Some(ChangeSummary { files: 25, lines: 900 }),
            ..Default::default()
        };
        assert_eq!(r.classify(&medium), ScaleTier::Medium);

        let large = ScaleRequest {
            changes: Some(ChangeSummary { files: 80, lines: 5000 }),
            ..Default::default()
        };
        assert_eq!(r.classify(&large), ScaleTier::Large);
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(router().classify(&ScaleRequest::default()), ScaleTier::Medium);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let request = ScaleRequest {
            description: Some("add pagination to the listing endpoint".to_string()),
            ..Default::default()
        };
        let r = router();
        let first = r.classify(&request);
        for _ in 0..10 {
            assert_eq!(r.classify(&request), first);
        }
    }

    #[test]
    fn test_recommendation_reasons() {
        let request = ScaleRequest {
            scale: Some(ScaleTier::Quick),
            ..Default::default()
        };
        let rec = router().recommend(&request);
        assert_eq!(rec.scale, ScaleTier::Quick);
        assert_eq!(rec.phases, vec![PhaseId::E, PhaseId::V]);
        assert!(rec.reasons.iter().any(|r| r.contains("Explicitly set")));

        let rec = router().recommend(&ScaleRequest::default());
        assert!(rec.reasons.iter().any(|r| r.contains("Default scale")));
    }

    #[test]
    fn test_estimate_minutes() {
        assert_eq!(router().estimate_minutes(ScaleTier::Quick), Some(5));
        assert_eq!(router().estimate_minutes(ScaleTier::Large), Some(60));
    }
}
