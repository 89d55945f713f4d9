//! Provisioning steps and the install/update workflows built from them
//!
//! Every step is safe to re-run: it checks the host before changing it and
//! reports [`workflow::StepOutcome::NoChange`] when there was nothing to do.

mod app;
mod database;
mod services;
mod system;
mod web;

pub use app::{
    CreateAdmin, CreateProject, PythonRequirements, Settings, SyncData, SyncMode,
    VerifyInstallation, Virtualenv,
};
pub use database::CreateDatabase;
pub use services::{
    CacheQueue, CompletionNotice, HealthCheck, MailRelay, RestartServices, SupervisorStatus,
    UpdateNotice,
};
pub use system::{Cleanup, Dependencies, SslCertificate, WorkingDir};
pub use web::{AppServer, ReverseProxy, Supervisor};

use workflow::{Checkpoint, PollConfig, StepOutcome, Workflow};

use crate::resolver::{Need, ProvisioningContext, Session};

/// Name of the application virtualenv
pub const VIRTUALENV: &str = "nodeshot";

/// Where nginx keeps the installed certificate and key
pub const SSL_DIR: &str = "/etc/nginx/ssl";

/// Processes supervised after an install, polled by the health check
pub const SUPERVISED: [&str; 3] = ["uwsgi", "celery", "celery-beat"];

/// Run `command` with the application virtualenv activated
///
/// `WORKON_HOME` is pinned to the acting user's home so the same env is
/// found when the command is elevated.
pub fn in_virtualenv(ctx: &ProvisioningContext, command: &str) -> workflow::Result<String> {
    let script = format!(
        "export WORKON_HOME={} && source /usr/local/bin/virtualenvwrapper.sh && workon {VIRTUALENV} && {command}",
        ctx.workon_home()?
    );
    Ok(format!("bash -c {}", shell_words::quote(&script)))
}

fn outcome(changed: bool) -> StepOutcome {
    if changed {
        StepOutcome::Changed
    } else {
        StepOutcome::NoChange
    }
}

/// The full install workflow
pub fn install(poll: PollConfig) -> Workflow<Session> {
    Workflow::new("install")
        .then(Checkpoint::new(
            "detect-platform",
            "Detect the OS release",
            vec![Need::Platform],
        ))
        .then(Checkpoint::new(
            "resolve-config",
            "Resolve install configuration",
            vec![Need::Dirs, Need::Server, Need::Database],
        ))
        .then(WorkingDir)
        .then(SslCertificate)
        .then(Dependencies)
        .then(CreateDatabase)
        .then(Virtualenv)
        .then(PythonRequirements)
        .then(CreateProject)
        .then(Settings)
        .then(CacheQueue)
        .then(SyncData(SyncMode::Install))
        .then(CreateAdmin)
        .then(ReverseProxy)
        .then(AppServer)
        .then(Supervisor)
        .then(MailRelay)
        .then(RestartServices)
        .then(Cleanup)
        .then(HealthCheck::new(poll))
        .then(CompletionNotice)
}

/// Upgrade an existing installation in place
pub fn update(poll: PollConfig) -> Workflow<Session> {
    Workflow::new("update")
        .then(Checkpoint::new(
            "resolve-config",
            "Resolve installation directories",
            vec![Need::Dirs],
        ))
        .then(VerifyInstallation)
        .then(PythonRequirements)
        .then(SyncData(SyncMode::Update))
        .then(RestartServices)
        .then(HealthCheck::new(poll))
        .then(UpdateNotice)
}
