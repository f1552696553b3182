//! Decision and artifact recording commands.

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};

use cadence::config::CadenceConfig;
use cadence::model::{ArtifactFields, DecisionFields};

pub fn cmd_decision(
    project_dir: &Path,
    title: &str,
    description: &str,
    alternatives: Vec<String>,
) -> Result<()> {
    let mut engine = CadenceConfig::load(project_dir)?.build_engine()?;
    let _ = engine.status(); // hydrate from the state file

    let decision = engine.record_decision(DecisionFields {
        title: title.to_string(),
        description: description.to_string(),
        alternatives,
    })?;

    println!();
    println!(
        "{} [{}] {}",
        style("Decision recorded:").green().bold(),
        decision.phase,
        decision.title
    );
    if !decision.alternatives.is_empty() {
        println!("  Considered: {}", decision.alternatives.join(", "));
    }
    Ok(())
}

pub fn cmd_artifact(
    project_dir: &Path,
    name: &str,
    kind: &str,
    path: Option<PathBuf>,
    description: Option<String>,
) -> Result<()> {
    let mut engine = CadenceConfig::load(project_dir)?.build_engine()?;
    let _ = engine.status(); // hydrate from the state file

    let artifact = engine.add_artifact(ArtifactFields {
        name: name.to_string(),
        kind: kind.to_string(),
        path,
        description,
    })?;

    println!();
    println!(
        "{} [{}] {} ({})",
        style("Artifact recorded:").green().bold(),
        artifact.phase,
        artifact.name,
        artifact.kind
    );
    if let Some(ref path) = artifact.path {
        println!("  Path: {}", path.display());
    }
    Ok(())
}
