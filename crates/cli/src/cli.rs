use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{diff_command, extract_command, generate_command};

#[derive(Parser, Debug)]
#[command(name = "projgen")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the project lives and what to put in it; overrides the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Generator config file (defaults to the nearest .projgen.json / projgen.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bazel workspace root (defaults to the config file's directory)
    #[arg(short, long)]
    pub workspace_root: Option<PathBuf>,

    /// Path to the bazel binary
    #[arg(short, long)]
    pub bazel: Option<PathBuf>,

    /// Build target label to include (repeatable), e.g. //app:App
    #[arg(short = 't', long = "target")]
    pub targets: Vec<String>,

    /// Path filter (repeatable), e.g. app/...
    #[arg(short = 'f', long = "filter")]
    pub filters: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract rules and write a project descriptor
    #[command(visible_alias = "g")]
    Generate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Directory the project bundle is written into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Project name
        #[arg(short, long)]
        name: Option<String>,

        /// Print the generated targets
        #[arg(short, long)]
        verbose: bool,
    },
    /// List the resolved rules of the configured packages
    #[command(visible_alias = "e")]
    Extract {
        #[command(flatten)]
        project: ProjectArgs,

        /// Print rules as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare a generated descriptor against a golden file
    Diff {
        /// Generated descriptor
        candidate: PathBuf,

        /// Reference descriptor
        golden: PathBuf,
    },
}

impl Commands {
    /// Execute the command
    pub fn execute(self) -> Result<()> {
        match self {
            Commands::Generate {
                project,
                output_dir,
                name,
                verbose,
            } => generate_command(&project, output_dir, name, verbose),
            Commands::Extract { project, json } => extract_command(&project, json),
            Commands::Diff { candidate, golden } => diff_command(&candidate, &golden),
        }
    }
}
