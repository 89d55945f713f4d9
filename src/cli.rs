use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackup")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision a nodeshot server over ssh", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/stackup/config.toml)
    #[arg(long, global = true, env = "STACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Managed host as [user@]host[:port] (default: localhost)
    #[arg(short = 'H', long, global = true, env = "STACKUP_HOST")]
    pub host: Option<String>,

    /// SSH identity file
    #[arg(short, long, global = true)]
    pub identity: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install nodeshot and its whole stack
    Install(InstallArgs),

    /// Update an existing installation
    Update(UpdateArgs),

    /// List the steps of a workflow
    Steps {
        /// Workflow to list
        #[arg(value_enum, default_value_t = WorkflowKind::Install)]
        workflow: WorkflowKind,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct InstallArgs {
    /// Take every default instead of prompting
    #[arg(long)]
    pub defaults: bool,

    /// Public server name (default: the host name)
    #[arg(long)]
    pub server_name: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Installation root, the parent of the nodeshot directory
    #[arg(long)]
    pub root_dir: Option<String>,

    /// Django project name
    #[arg(long)]
    pub project: Option<String>,

    /// Take every default instead of prompting
    #[arg(long)]
    pub defaults: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WorkflowKind {
    Install,
    Update,
}
