//! State-file maintenance commands.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use std::path::Path;

use crate::StateCommands;
use cadence::config::CadenceConfig;
use cadence::state::StateStore;

pub fn cmd_state(project_dir: &Path, command: &StateCommands) -> Result<()> {
    let config = CadenceConfig::load(project_dir)?;
    let mut store = StateStore::new(&config.state_file);

    match command {
        StateCommands::Stats => {
            let stats = store.stats();
            println!();
            println!("{}", style("Workflow state").bold());
            println!("  File:      {}", config.state_file.display());
            println!("  Total:     {}", stats.total);
            println!("  Running:   {}", stats.running);
            println!("  Completed: {}", stats.completed);
            println!("  Cancelled: {}", stats.cancelled);
            println!("  By scale:");
            for (tier, count) in &stats.by_scale {
                println!("    {:<8} {}", tier.to_string(), count);
            }

            // Configured checks per gate, including host-registered commands.
            let engine = config.build_engine()?;
            println!("  Gates:");
            for (gate, summary) in engine.gates().summary() {
                println!(
                    "    {:<8} {} check(s), {} blocking, {} advisory",
                    gate.to_string(),
                    summary.total,
                    summary.blocking,
                    summary.warning
                );
            }
            println!();
        }
        StateCommands::Clear => {
            let outcome = store.clear_completed();
            println!(
                "Cleared {} workflow(s), {} remaining",
                outcome.cleared, outcome.remaining
            );
        }
        StateCommands::Delete { id } => {
            if store.delete(id) {
                println!("Deleted workflow {id}");
            } else {
                println!("No workflow with id {id}");
            }
        }
        StateCommands::Export { output } => {
            if store.export(output) {
                println!("Exported state to {}", output.display());
            } else {
                anyhow::bail!("Failed to export state to {}", output.display());
            }
        }
        StateCommands::Import { input } => {
            let outcome = store.import(input);
            match outcome.error {
                None => println!("Imported {} new workflow(s)", outcome.imported),
                Some(err) => anyhow::bail!("Import failed: {err}"),
            }
        }
        StateCommands::Reset { force } => {
            if !force {
                let confirm = Confirm::new()
                    .with_prompt("This will erase all workflow records. Are you sure?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);
                if !confirm {
                    println!("Reset cancelled");
                    return Ok(());
                }
            }
            if store.reset() {
                println!("State reset");
            } else {
                anyhow::bail!("Failed to reset state file");
            }
        }
    }
    Ok(())
}
