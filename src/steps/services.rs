//! Background services, restarts and the final health check

use std::collections::BTreeSet;

use workflow::{
    CommandRunner, ManagedFile, PollCallback, PollConfig, RunOptions, ServiceStatus, StatusReader,
    Step, StepEnv, StepOutcome, await_healthy, render,
};

use super::{SUPERVISED, in_virtualenv, outcome};
use crate::resolver::{Need, Session};
use crate::{templates, ui};

/// redis as the celery broker
#[derive(Debug)]
pub struct CacheQueue;

impl Step<Session> for CacheQueue {
    fn id(&self) -> &'static str {
        "cache-queue"
    }

    fn description(&self) -> String {
        "Install redis and celery".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        env.runner
            .run_checked("apt-get -y install redis-server", RunOptions::elevated())?;
        env.runner.run_checked(
            &in_virtualenv(ctx, "pip install -U 'celery[redis]'")?,
            RunOptions::plain(),
        )?;
        env.runner.run_checked(
            "echo 1 > /proc/sys/vm/overcommit_memory",
            RunOptions::elevated(),
        )?;
        env.runner
            .run_checked("service redis-server restart", RunOptions::elevated())?;
        Ok(StepOutcome::Changed)
    }
}

/// postfix, delivering local mail only
#[derive(Debug)]
pub struct MailRelay;

impl Step<Session> for MailRelay {
    fn id(&self) -> &'static str {
        "mail-relay"
    }

    fn description(&self) -> String {
        "Install and configure postfix".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs, Need::Server]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        env.runner.run_checked(
            "DEBIAN_FRONTEND=noninteractive apt-get -y install postfix",
            RunOptions::elevated(),
        )?;

        let main_cf = render(
            templates::POSTFIX_MAIN,
            &[(templates::SERVER_NAME, ctx.server_name()?)],
        )?;
        let changed = ManagedFile::new("/etc/postfix/main.cf", "postfix", ctx.use_sudo()?)
            .apply(env.runner, &main_cf)?;

        if changed {
            env.runner
                .run_checked("service postfix restart", RunOptions::elevated())?;
        }
        Ok(outcome(changed))
    }
}

#[derive(Debug)]
pub struct RestartServices;

impl Step<Session> for RestartServices {
    fn id(&self) -> &'static str {
        "restart-services"
    }

    fn description(&self) -> String {
        "Restart nginx and supervised processes".into()
    }

    fn run(&self, _session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        env.runner.run_checked(
            "service nginx restart && supervisorctl restart all",
            RunOptions::elevated(),
        )?;
        Ok(StepOutcome::Changed)
    }
}

/// Reads process states from `supervisorctl status`
pub struct SupervisorStatus<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> SupervisorStatus<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// State of `process` in `supervisorctl status` output
    ///
    /// Lines look like `celery  RUNNING  pid 1234, uptime 0:01:02`.
    pub fn parse(process: &str, output: &str) -> ServiceStatus {
        output
            .lines()
            .find_map(|line| {
                let mut columns = line.split_whitespace();
                let name = columns.next()?;
                let state = columns.next()?;
                let name = name.rsplit(':').next().unwrap_or(name);
                (name == process).then(|| ServiceStatus::classify(state))
            })
            .unwrap_or(ServiceStatus::Unknown)
    }
}

impl StatusReader for SupervisorStatus<'_> {
    fn read_status(&mut self, process: &str) -> workflow::Result<ServiceStatus> {
        // non-zero exit just means "not running"; the state is on stdout
        let output = self.runner.run(
            &format!("supervisorctl status {process}"),
            RunOptions::elevated(),
        )?;
        Ok(Self::parse(process, &output.stdout_str()))
    }
}

/// Logs processes still starting
struct WaitingLog;

impl PollCallback for WaitingLog {
    fn on_waiting(&self, attempt: u32, pending: &[String]) {
        log::info!("waiting for {} (poll {attempt})", pending.join(", "));
    }
}

/// Wait until every supervised process runs
#[derive(Debug)]
pub struct HealthCheck {
    config: PollConfig,
}

impl HealthCheck {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }
}

impl Step<Session> for HealthCheck {
    fn id(&self) -> &'static str {
        "health-check"
    }

    fn description(&self) -> String {
        "Wait for services to be running".into()
    }

    fn run(&self, _session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let processes: BTreeSet<String> = SUPERVISED.iter().map(|p| (*p).to_string()).collect();
        let mut reader = SupervisorStatus::new(env.runner);
        let report = await_healthy(&processes, &mut reader, &self.config, Some(&WaitingLog))?;
        log::info!("all services running after {} poll(s)", report.attempts);
        Ok(StepOutcome::NoChange)
    }
}

#[derive(Debug)]
pub struct CompletionNotice;

impl Step<Session> for CompletionNotice {
    fn id(&self) -> &'static str {
        "completion-notice"
    }

    fn description(&self) -> String {
        "Report the finished installation".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Server]
    }

    fn run(&self, session: &Session, _env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let server_name = session.context().server_name()?;
        ui::notice(
            "INSTALLATION COMPLETED",
            &[
                "A superuser with username admin and password admin was created.".to_string(),
                "Change its password right away at:".to_string(),
                format!("https://{server_name}/admin/"),
            ],
        );
        Ok(StepOutcome::NoChange)
    }
}

#[derive(Debug)]
pub struct UpdateNotice;

impl Step<Session> for UpdateNotice {
    fn id(&self) -> &'static str {
        "update-notice"
    }

    fn description(&self) -> String {
        "Report the finished update".into()
    }

    fn run(&self, session: &Session, _env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let app_dir = session.context().app_dir()?;
        ui::notice("UPDATE COMPLETED", &[format!("{app_dir} is up to date.")]);
        Ok(StepOutcome::NoChange)
    }
}
