use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "forkstate",
    about = "forkstate — speculative branching over versioned slots",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with root configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Place N queens by backtracking through transactions
    Queens(QueensArgs),
    /// Write each value in its own branch and merge the branches
    Merge(MergeArgs),
}

#[derive(Args)]
pub struct QueensArgs {
    #[arg(short = 'n', long, default_value = "8")]
    pub size: usize,
}

#[derive(Args)]
pub struct MergeArgs {
    /// A branch's value; parsed as JSON, falling back to a plain string
    #[arg(long = "value")]
    pub values: Vec<String>,
    /// Add a branch that marks the value as not known
    #[arg(long)]
    pub unknown: bool,
    /// Treat not-known branches as carrying no information
    #[arg(long)]
    pub or_none: bool,
}
