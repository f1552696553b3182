//! Console rendering for workflows, gates, and recommendations.

use console::style;

use crate::engine::{CompletionReport, WorkflowStatusView};
use crate::gates::{CheckResult, QualityGateResult, Severity};
use crate::model::Workflow;
use crate::phase::{PhaseRegistry, TimelineStatus};
use crate::scale::ScaleRecommendation;

const RULE_WIDTH: usize = 44;

fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}

fn phases_arrow(phases: &[crate::phase::PhaseId]) -> String {
    phases
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" → ")
}

pub fn print_start_banner(workflow: &Workflow, registry: &PhaseRegistry) {
    println!();
    println!("{}", style("Workflow started").green().bold());
    println!("{}", style(rule()).dim());
    println!("  Name:   {}", style(&workflow.name).cyan());
    println!("  Scale:  {}", style(workflow.scale).yellow());
    println!("  Phases: {}", style(phases_arrow(&workflow.phases)).blue());
    if !workflow.description.is_empty() {
        println!("  About:  {}", workflow.description);
    }
    println!("{}", style(rule()).dim());
    print_phase_info(registry, workflow.current_phase);
}

/// Describe the named phase: what it is for, who owns it, what it produces.
pub fn print_phase_info(registry: &PhaseRegistry, phase: crate::phase::PhaseId) {
    let info = registry.phase_info(phase);
    println!();
    println!(
        "{}",
        style(format!("Current phase: {} ({})", info.name, info.id)).cyan().bold()
    );
    println!("  {}", info.description);
    println!(
        "  Roles:   {}",
        info.roles
            .iter()
            .map(|r| format!("@{r}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Outputs: {}", info.outputs.join(", "));
}

fn check_line(result: &CheckResult) -> String {
    let marker = if result.passed {
        style("✓").green()
    } else if result.severity == Severity::Block {
        style("✗").red()
    } else {
        style("!").yellow()
    };
    format!("  {marker} {}: {}", result.name, result.message)
}

pub fn print_gate_result(result: &QualityGateResult) {
    println!();
    println!("{}", style(format!("Quality gate: {}", result.gate)).bold());
    for check in &result.checks {
        println!("{}", check_line(check));
    }
    if result.passed {
        println!("  {}", style("PASSED").green().bold());
    } else {
        println!(
            "  {} ({} blocking issue(s))",
            style("FAILED").red().bold(),
            result.failures.len()
        );
    }
    if !result.warnings.is_empty() {
        println!("  {} warning(s)", result.warnings.len());
    }
}

pub fn print_status(view: &WorkflowStatusView, registry: &PhaseRegistry) {
    println!();
    println!("{}", style("Workflow status").bold());
    println!("{}", style(rule()).dim());
    println!("  Name:     {}", style(&view.name).cyan());
    println!("  Id:       {}", style(&view.id).dim());
    println!("  Scale:    {}", view.scale);
    println!("  Status:   {:?}", view.status);
    println!("  Elapsed:  {}", view.duration);
    println!(
        "  Progress: {}/{} phases ({}%)",
        view.progress.current, view.progress.total, view.progress.percentage
    );

    // Timeline with the current phase highlighted.
    if let Ok(timeline) = registry.timeline(view.current_phase, view.scale) {
        let rendered: Vec<String> = timeline
            .iter()
            .map(|entry| {
                let id = entry.phase.id.as_str();
                match entry.status {
                    TimelineStatus::Completed => style(id).green().to_string(),
                    TimelineStatus::Current => style(id).cyan().bold().to_string(),
                    TimelineStatus::Pending => style(id).dim().to_string(),
                }
            })
            .collect();
        println!("  Timeline: [{}]", rendered.join(" → "));
    }

    if !view.decisions.is_empty() {
        println!("  Decisions:");
        for decision in &view.decisions {
            println!("    [{}] {}", decision.phase, decision.title);
        }
    }
    if !view.artifacts.is_empty() {
        println!("  Artifacts:");
        for artifact in &view.artifacts {
            println!("    [{}] {} ({})", artifact.phase, artifact.name, artifact.kind);
        }
    }
    println!("{}", style(rule()).dim());
}

pub fn print_completion(report: &CompletionReport) {
    let workflow = &report.workflow;
    println!();
    println!("{}", style("Workflow completed").green().bold());
    println!("{}", style(rule()).dim());
    println!("  Name:      {}", workflow.name);
    println!("  Scale:     {}", workflow.scale);
    println!(
        "  Duration:  {}",
        workflow.duration_string(chrono::Utc::now())
    );
    println!("  Artifacts: {}", workflow.artifacts.len());
    println!("  Decisions: {}", workflow.decisions.len());
    println!("{}", style(rule()).dim());
    print_gate_result(&report.final_gate);
}

pub fn print_cancelled(workflow: &Workflow) {
    println!();
    println!("{}", style("Workflow cancelled").yellow().bold());
    if let Some(ref reason) = workflow.cancel_reason {
        println!("  Reason: {reason}");
    }
}

pub fn print_recommendation(rec: &ScaleRecommendation) {
    println!();
    println!(
        "{} {}",
        style("Recommended scale:").bold(),
        style(rec.scale).yellow()
    );
    println!("  Phases:   {}", phases_arrow(&rec.phases));
    println!("  Estimate: ~{} min", rec.estimated_minutes);
    println!("  Fits:     {}", rec.description);
    println!("  Reasons:");
    for reason in &rec.reasons {
        println!("    • {reason}");
    }
}
