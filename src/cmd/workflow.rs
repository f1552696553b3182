//! Workflow lifecycle commands.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use cadence::config::CadenceConfig;
use cadence::engine::{AdvanceOptions, AdvanceOutcome, StartOptions, WorkflowEngine};
use cadence::scale::{ChangeSummary, ScaleRequest, ScaleTier};
use cadence::ui;

fn build_engine(project_dir: &Path) -> Result<WorkflowEngine> {
    CadenceConfig::load(project_dir)?.build_engine()
}

fn change_summary(files: Option<usize>, lines: Option<usize>) -> Option<ChangeSummary> {
    if files.is_none() && lines.is_none() {
        return None;
    }
    Some(ChangeSummary {
        files: files.unwrap_or(0),
        lines: lines.unwrap_or(0),
    })
}

/// Hydrate the engine's current workflow from the state file. CLI commands
/// run in fresh processes, so recovery has to happen before any operation
/// that requires an active workflow.
fn recover(engine: &mut WorkflowEngine) {
    let _ = engine.status();
}

pub fn cmd_start(
    project_dir: &Path,
    name: &str,
    description: &str,
    scale: Option<&str>,
    files: Option<usize>,
    lines: Option<usize>,
) -> Result<()> {
    let mut engine = build_engine(project_dir)?;

    let scale = scale
        .map(|s| s.parse::<ScaleTier>())
        .transpose()
        .context("Unrecognized --scale value")?;

    if engine.status().is_some() {
        println!(
            "{}",
            style("Note: another workflow is already running; it stays in the state file.").yellow()
        );
    }

    let workflow = engine.start(name, StartOptions {
        description: description.to_string(),
        scale,
        changes: change_summary(files, lines),
    })?;
    let workflow = workflow.clone();
    ui::print_start_banner(&workflow, engine.registry());
    Ok(())
}

pub async fn cmd_advance(project_dir: &Path, force: bool, notes: &str) -> Result<()> {
    let mut engine = build_engine(project_dir)?;
    recover(&mut engine);

    let outcome = engine
        .advance(AdvanceOptions {
            force,
            notes: notes.to_string(),
        })
        .await?;

    match outcome {
        AdvanceOutcome::Advanced { phase, gate } => {
            ui::print_gate_result(&gate);
            println!();
            println!("{}", style("Phase advanced").green().bold());
            ui::print_phase_info(engine.registry(), phase);
        }
        AdvanceOutcome::Blocked { gate } => {
            ui::print_gate_result(&gate);
            println!();
            println!("{}", style("Phase gate failed").red().bold());
            println!("{}", style("Use --force to advance anyway.").dim());
        }
        AdvanceOutcome::Completed(report) => {
            ui::print_completion(&report);
        }
    }
    Ok(())
}

pub async fn cmd_complete(project_dir: &Path) -> Result<()> {
    let mut engine = build_engine(project_dir)?;
    recover(&mut engine);
    let report = engine.complete().await?;
    ui::print_completion(&report);
    Ok(())
}

pub fn cmd_cancel(project_dir: &Path, reason: &str) -> Result<()> {
    let mut engine = build_engine(project_dir)?;
    recover(&mut engine);
    let workflow = engine.cancel(reason)?;
    ui::print_cancelled(&workflow);
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    let mut engine = build_engine(project_dir)?;
    match engine.status() {
        Some(view) => ui::print_status(&view, engine.registry()),
        None => {
            println!();
            println!("No active workflow. Run 'cadence start <name>' to begin.");
            println!();
        }
    }
    Ok(())
}

pub fn cmd_list(project_dir: &Path) -> Result<()> {
    let mut engine = build_engine(project_dir)?;
    let list = engine.list();

    println!();
    match &list.active {
        Some(active) => println!(
            "Active:  {} ({}, {} phase {})",
            style(&active.name).cyan(),
            active.scale,
            style("in").dim(),
            active.current_phase
        ),
        None => println!("Active:  {}", style("none").dim()),
    }

    if list.history.is_empty() {
        println!("History: {}", style("empty").dim());
    } else {
        println!("History:");
        for workflow in &list.history {
            println!(
                "  {:<10} {:<8} {} {}",
                format!("{:?}", workflow.status).to_lowercase(),
                workflow.scale.to_string(),
                workflow.name,
                style(&workflow.id).dim()
            );
        }
    }
    println!();
    Ok(())
}

pub fn cmd_recommend(
    project_dir: &Path,
    description: &str,
    files: Option<usize>,
    lines: Option<usize>,
) -> Result<()> {
    let engine = build_engine(project_dir)?;
    let recommendation = engine.recommend(&ScaleRequest {
        scale: None,
        description: (!description.is_empty()).then(|| description.to_string()),
        changes: change_summary(files, lines),
    });
    ui::print_recommendation(&recommendation);
    Ok(())
}
