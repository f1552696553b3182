//! Typed error hierarchy for the Cadence engine.
//!
//! Two top-level enums cover the two failure domains:
//! - `RegistryError` — phase/scale lookup failures (programmer errors, always surfaced)
//! - `EngineError` — workflow lifecycle precondition violations
//!
//! Gate check failures and persistence I/O errors are deliberately *not* here:
//! checks are recovered into failed check results inside the gate runner, and
//! store I/O degrades into boolean/empty returns (see `state.rs`).

use thiserror::Error;

/// Errors from the phase registry and scale router.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Unknown scale: {0}")]
    UnknownScale(String),

    #[error("Phase {phase} not in sequence for scale {scale}")]
    PhaseNotInSequence { phase: String, scale: String },
}

/// Errors from the workflow engine lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No active workflow. Start a workflow first.")]
    NoActiveWorkflow,

    #[error("Scale {scale} resolves to an empty phase sequence")]
    NoPhaseAvailable { scale: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_unknown_phase_carries_id() {
        let err = RegistryError::UnknownPhase("X".to_string());
        assert!(err.to_string().contains("X"));
        assert!(matches!(err, RegistryError::UnknownPhase(_)));
    }

    #[test]
    fn registry_error_not_in_sequence_names_both() {
        let err = RegistryError::PhaseNotInSequence {
            phase: "C".to_string(),
            scale: "QUICK".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("C"));
        assert!(msg.contains("QUICK"));
    }

    #[test]
    fn engine_error_converts_from_registry_error() {
        let inner = RegistryError::UnknownScale("HUGE".to_string());
        let err: EngineError = inner.into();
        match &err {
            EngineError::Registry(RegistryError::UnknownScale(s)) => assert_eq!(s, "HUGE"),
            _ => panic!("Expected EngineError::Registry(UnknownScale(...))"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&RegistryError::UnknownPhase("Z".into()));
        assert_std_error(&EngineError::NoActiveWorkflow);
    }
}
