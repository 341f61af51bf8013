mod cli;
mod commands;
mod context;
mod desired;
mod engine;
mod error;
mod platform;
mod runner;
mod state;
mod topology;
mod ui;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::run(&args),
        Commands::Validate(args) => commands::validate::run(&args),
        Commands::Plan(args) => commands::plan::run(&args),
        Commands::Apply(args) => commands::apply::run(&args),
        Commands::Watch(args) => commands::watch::run(&args),
        Commands::Destroy(args) => commands::destroy::run(&args),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "labsync", &mut io::stdout());
            Ok(())
        }
    }
}
