//! Subcommand implementations

pub mod install;
pub mod steps;
pub mod update;

use anyhow::Result;
use colored::Colorize;
use workflow::{
    CommandRunner, DefaultsPrompter, NoProgress, Prompter, RunSummary, StepEnv, Workflow, execute,
};

use crate::Context as AppContext;
use crate::config::Config;
use crate::progress::ConsoleProgress;
use crate::resolver::{ResolveMode, Session, TerminalPrompter};
use crate::runner::LocalRunner;
use crate::ssh::{HostSpec, SshRunner};
use crate::ui;

/// Everything needed to talk to the managed host
pub struct Connection {
    pub config: Config,
    pub target: HostSpec,
    pub runner: Box<dyn CommandRunner>,
}

/// Load the config file and pick a runner for the managed host
pub fn connect(ctx: &AppContext) -> Result<Connection> {
    let config = Config::load(ctx.config.as_deref())?;
    let target = config.connection.target(ctx.host.as_deref())?;

    let runner: Box<dyn CommandRunner> = if target.is_local() {
        log::debug!("running commands locally");
        ui::info("No host given, provisioning this machine");
        Box::new(LocalRunner::new())
    } else {
        let identity = config.connection.identity(ctx.identity.as_deref());
        log::debug!("running commands over ssh on {target}");
        Box::new(SshRunner::new(target.clone(), identity))
    };

    Ok(Connection {
        config,
        target,
        runner,
    })
}

/// Run a workflow against the managed host, reporting progress
pub fn provision(
    ctx: &AppContext,
    workflow: &Workflow<Session>,
    session: &mut Session,
    runner: &dyn CommandRunner,
    mode: ResolveMode,
) -> Result<RunSummary> {
    let mut terminal = TerminalPrompter;
    let mut defaults = DefaultsPrompter;
    let prompter: &mut dyn Prompter = match mode {
        ResolveMode::Interactive => &mut terminal,
        ResolveMode::Defaults => &mut defaults,
    };
    let mut env = StepEnv::new(runner, prompter);

    let result = if ctx.quiet {
        execute(workflow, session, &mut env, &mut NoProgress)
    } else {
        let mut progress = ConsoleProgress::new(mode == ResolveMode::Interactive);
        execute(workflow, session, &mut env, &mut progress)
    };

    match result {
        Ok(summary) => Ok(summary),
        Err(e) => {
            let category = e.source.category();
            println!();
            ui::error(&format!("{}: {}", category.description(), e.source));
            ui::dim(category.advice());
            if !e.completed.steps.is_empty() {
                ui::dim(&format!(
                    "{} step(s) completed before the failure; re-running is safe",
                    e.completed.total()
                ));
            }
            Err(e.into())
        }
    }
}

/// Print counts of what a run did
pub fn print_summary(summary: &RunSummary) {
    println!();
    ui::success(&format!("{} step(s) finished", summary.total()));
    println!(
        "  {} changed, {} unchanged, {} skipped",
        summary.changed.to_string().green(),
        summary.unchanged.to_string().dimmed(),
        summary.skipped.to_string().yellow()
    );
}
