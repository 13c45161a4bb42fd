//! Command line surface: `gosr <command> <project-dir> [--stage r|s]`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Config, ProjectDir, TreeFile};
use crate::error::AppResult;
use crate::llm::{ChatBackend, OpenAiClient};
use crate::reports::{write_doc, write_maps, write_mindmap, write_resource_csv};
use crate::stages::{
    goal_to_obstacles, normalize_resources, obstacles_to_solutions, recheck_resource_urls, solutions_to_resources,
    stats, StageContext, StageReport,
};

/// Goal → obstacles → solutions → resources.
#[derive(Parser, Debug)]
#[command(name = "gosr", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Tree a report is built from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// r.json
    R,
    /// s.json
    S,
}

impl From<Stage> for TreeFile {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::R => TreeFile::Resources,
            Stage::S => TreeFile::Solutions,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Expand the goal into obstacles and contributing factors (o.json)
    G2o {
        /// Project directory holding config.yaml
        project: PathBuf,
    },

    /// Propose solutions for every leaf obstacle (s.json)
    O2s { project: PathBuf },

    /// Find local resources for every leaf solution (r.json, resources-raw.json)
    S2r { project: PathBuf },

    /// Normalize resources-raw.json into resources.json and check websites
    Resources { project: PathBuf },

    /// Retry websites marked invalid in resources.json
    RecheckUrls { project: PathBuf },

    /// Print resource, website and node statistics
    Stats { project: PathBuf },

    /// Export a FreeMind mind map (<stage>.mm)
    Mindmap {
        project: PathBuf,
        #[arg(long, value_enum)]
        stage: Stage,
    },

    /// Export a Word document
    Doc {
        project: PathBuf,
        #[arg(long, value_enum)]
        stage: Stage,
    },

    /// Export resources.csv
    Csv { project: PathBuf },

    /// Export Google Maps CSVs, mailing_list.csv and google-maps.json
    Maps { project: PathBuf },
}

impl Command {
    /// Name used for the command's log file.
    pub fn name(&self) -> &'static str {
        match self {
            Command::G2o { .. } => "g2o",
            Command::O2s { .. } => "o2s",
            Command::S2r { .. } => "s2r",
            Command::Resources { .. } => "resources",
            Command::RecheckUrls { .. } => "recheck-urls",
            Command::Stats { .. } => "stats",
            Command::Mindmap { .. } => "mindmap",
            Command::Doc { .. } => "doc",
            Command::Csv { .. } => "csv",
            Command::Maps { .. } => "maps",
        }
    }

    pub fn project(&self) -> &Path {
        match self {
            Command::G2o { project }
            | Command::O2s { project }
            | Command::S2r { project }
            | Command::Resources { project }
            | Command::RecheckUrls { project }
            | Command::Stats { project }
            | Command::Mindmap { project, .. }
            | Command::Doc { project, .. }
            | Command::Csv { project }
            | Command::Maps { project } => project,
        }
    }

    /// Whether the command talks to the model.
    pub fn uses_llm(&self) -> bool {
        matches!(self, Command::G2o { .. } | Command::O2s { .. } | Command::S2r { .. })
    }
}

/// Run a command, connecting to OpenAI only for the LLM stages.
pub async fn run(command: &Command, config: &Config) -> AppResult<()> {
    run_with_backend(command, config, || {
        let client = OpenAiClient::new(&config.openai, &config.request)?;
        info!(base_url = %client.base_url(), model = %client.model(), "OpenAI client initialized");
        Ok(Box::new(client) as Box<dyn ChatBackend>)
    })
    .await
}

/// Run a command with a caller-supplied backend factory.
pub async fn run_with_backend<F>(command: &Command, config: &Config, backend: F) -> AppResult<()>
where
    F: FnOnce() -> AppResult<Box<dyn ChatBackend>>,
{
    let project = ProjectDir::new(command.project());
    let open = |project: ProjectDir| -> AppResult<StageContext> {
        StageContext::open(project, backend()?, &config.request)
    };

    match command {
        Command::G2o { .. } => log_report(command, goal_to_obstacles(&mut open(project)?).await?),
        Command::O2s { .. } => log_report(command, obstacles_to_solutions(&mut open(project)?).await?),
        Command::S2r { .. } => log_report(command, solutions_to_resources(&mut open(project)?).await?),
        Command::Resources { .. } => {
            let list = normalize_resources(&project).await?;
            info!(resources = list.len(), "Wrote resources.json");
        }
        Command::RecheckUrls { .. } => {
            recheck_resource_urls(&project).await?;
        }
        Command::Stats { .. } => {
            stats(&project)?;
        }
        Command::Mindmap { stage, .. } => {
            write_mindmap(&project, (*stage).into())?;
        }
        Command::Doc { stage, .. } => {
            write_doc(&project, (*stage).into())?;
        }
        Command::Csv { .. } => {
            write_resource_csv(&project)?;
        }
        Command::Maps { .. } => {
            write_maps(&project)?;
        }
    }
    Ok(())
}

fn log_report(command: &Command, report: StageReport) {
    info!(
        command = command.name(),
        leaves = report.leaves,
        added = report.added,
        skipped = report.skipped,
        "Done"
    );
}
