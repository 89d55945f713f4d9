mod cli;
mod commands;
mod config;
mod platform;
mod progress;
mod resolver;
mod runner;
mod ssh;
mod steps;
mod sudo;
mod templates;
#[cfg(test)]
mod testing;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub identity: Option<PathBuf>,
}

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

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        host: cli.host,
        identity: cli.identity,
    };
    log::trace!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Install(args) => commands::install::run(&ctx, args),
        Command::Update(args) => commands::update::run(&ctx, args),
        Command::Steps { workflow } => commands::steps::run(workflow),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stackup", &mut io::stdout());
            Ok(())
        }
    }
}
