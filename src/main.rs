use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version, about = "Staged development workflow orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding .cadence/ (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new workflow
    Start {
        name: String,

        /// What this unit of work is about (also used for scale detection)
        #[arg(short, long, default_value = "")]
        description: String,

        /// Explicit scale tier: QUICK, SMALL, MEDIUM, or LARGE
        #[arg(short, long)]
        scale: Option<String>,

        /// Expected number of files touched (scale detection hint)
        #[arg(long)]
        files: Option<usize>,

        /// Expected number of changed lines (scale detection hint)
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Run the current phase's quality gate and move to the next phase
    Advance {
        /// Advance even if the gate has blocking failures
        #[arg(long)]
        force: bool,

        /// Notes to attach to the transition record
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Run the final gate and mark the workflow completed
    Complete,
    /// Cancel the current workflow
    Cancel {
        #[arg(short, long, default_value = "")]
        reason: String,
    },
    /// Show the current workflow, recovering it from the state file if needed
    Status,
    /// List the active workflow and all historical runs
    List,
    /// Record a decision in the current phase
    Decision {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Alternatives that were considered (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        alternatives: Vec<String>,
    },
    /// Record an artifact produced in the current phase
    Artifact {
        name: String,

        /// Type tag: code, doc, test, ...
        #[arg(short, long, default_value = "code")]
        kind: String,

        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Show which scale a request would be routed to, and why
    Recommend {
        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long)]
        files: Option<usize>,

        #[arg(long)]
        lines: Option<usize>,
    },
    /// Inspect or maintain the workflow state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// Workflow counts by status and scale
    Stats,
    /// Remove every completed and cancelled workflow
    Clear,
    /// Remove one workflow by id
    Delete { id: String },
    /// Dump the state document to a file
    Export { output: PathBuf },
    /// Merge workflows from an exported state document
    Import { input: PathBuf },
    /// Replace the state document with an empty one
    Reset {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "cadence=debug" } else { "cadence=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_dir = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().expect("cannot determine current directory"));

    match &cli.command {
        Commands::Start {
            name,
            description,
            scale,
            files,
            lines,
        } => cmd::cmd_start(&project_dir, name, description, scale.as_deref(), *files, *lines)?,
        Commands::Advance { force, notes } => {
            cmd::cmd_advance(&project_dir, *force, notes).await?
        }
        Commands::Complete => cmd::cmd_complete(&project_dir).await?,
        Commands::Cancel { reason } => cmd::cmd_cancel(&project_dir, reason)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::List => cmd::cmd_list(&project_dir)?,
        Commands::Decision {
            title,
            description,
            alternatives,
        } => cmd::cmd_decision(&project_dir, title, description, alternatives.clone())?,
        Commands::Artifact {
            name,
            kind,
            path,
            description,
        } => cmd::cmd_artifact(&project_dir, name, kind, path.clone(), description.clone())?,
        Commands::Recommend {
            description,
            files,
            lines,
        } => cmd::cmd_recommend(&project_dir, description, *files, *lines)?,
        Commands::State { command } => cmd::cmd_state(&project_dir, command)?,
    }

    Ok(())
}
