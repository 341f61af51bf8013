use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::engine::scheduler::DEFAULT_INTERVAL_SECS;

#[derive(Parser)]
#[command(name = "labsync")]
#[command(version)]
#[command(about = "Keep a GNS3 lab in sync with a declarative topology", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter topology file
    Init(InitArgs),

    /// Check a topology file without touching the platform
    Validate(TopologyArgs),

    /// Preview what apply would change
    Plan(TopologyArgs),

    /// Run one reconciliation pass
    Apply(TopologyArgs),

    /// Reconcile continuously on file changes and a timer
    Watch(WatchArgs),

    /// Delete everything in the project
    Destroy(DestroyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct TopologyArgs {
    /// Topology file
    #[arg(short, long, default_value = "topology.yaml")]
    pub config: PathBuf,

    /// Platform address, overriding the topology's `server` field
    #[arg(short, long, env = "LABSYNC_SERVER")]
    pub server: Option<String>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Where to write the file
    #[arg(default_value = "topology.yaml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct WatchArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Seconds between timer-driven passes
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval: u64,
}

#[derive(Parser)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
