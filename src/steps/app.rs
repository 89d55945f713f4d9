//! Python environment and the Django application

use workflow::{Error, ManagedFile, RunOptions, Step, StepEnv, StepOutcome, render};

use super::{VIRTUALENV, in_virtualenv, outcome};
use crate::resolver::{Need, Session};

/// Application release installed into the virtualenv
pub const APP_TARBALL: &str = "https://github.com/ninuxorg/nodeshot/tarball/master";

const WRAPPER_SCRIPT: &str = "/usr/local/bin/virtualenvwrapper.sh";

/// virtualenvwrapper and the application virtualenv
#[derive(Debug)]
pub struct Virtualenv;

impl Step<Session> for Virtualenv {
    fn id(&self) -> &'static str {
        "virtualenv"
    }

    fn description(&self) -> String {
        "Set up virtualenvwrapper and the application virtualenv".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let home = ctx.home_dir()?;
        let workon_home = ctx.workon_home()?;

        env.runner
            .run_checked("pip install virtualenvwrapper", RunOptions::elevated())?;

        let line = format!("export WORKON_HOME={workon_home}\nsource {WRAPPER_SCRIPT}");
        let mut changed = ManagedFile::new(format!("{home}/.bash_profile"), "virtualenvwrapper", false)
            .apply(env.runner, &line)?;
        changed |= ManagedFile::new("/root/.bashrc", "virtualenvwrapper", ctx.use_sudo()?)
            .apply(env.runner, &format!("source {WRAPPER_SCRIPT}"))?;

        let venv = format!("{workon_home}/{VIRTUALENV}");
        if !env.runner.path_exists(&venv)? {
            let script = format!(
                "export WORKON_HOME={workon_home} && source {WRAPPER_SCRIPT} && mkvirtualenv {VIRTUALENV}"
            );
            env.runner.run_checked(
                &format!("bash -c {}", shell_words::quote(&script)),
                RunOptions::quiet(),
            )?;
            changed = true;
        }

        let operator = ctx.operator()?;
        env.runner.run_checked(
            &format!("chown -R {operator}:{operator} {workon_home}"),
            RunOptions::elevated(),
        )?;
        Ok(outcome(changed))
    }
}

/// Python packages inside the virtualenv
#[derive(Debug)]
pub struct PythonRequirements;

impl Step<Session> for PythonRequirements {
    fn id(&self) -> &'static str {
        "python-requirements"
    }

    fn description(&self) -> String {
        "Install python requirements".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        for package in ["distribute", APP_TARBALL] {
            env.runner.run_checked(
                &in_virtualenv(ctx, &format!("pip install -U {package}"))?,
                RunOptions::plain(),
            )?;
        }
        Ok(StepOutcome::Changed)
    }
}

/// Scaffold the Django project and set ownership
#[derive(Debug)]
pub struct CreateProject;

impl Step<Session> for CreateProject {
    fn id(&self) -> &'static str {
        "create-project"
    }

    fn description(&self) -> String {
        "Create the project".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let root_dir = ctx.root_dir()?;
        let app_dir = ctx.app_dir()?;
        let project = ctx.project_name()?;
        let operator = ctx.operator()?;
        let mut changed = false;

        env.runner
            .run_checked(&format!("mkdir -p {app_dir}"), RunOptions::elevated())?;

        if !env.runner.path_exists(&format!("{app_dir}/manage.py"))? {
            let scaffold = in_virtualenv(
                ctx,
                &format!("nodeshot startproject {project} {}", crate::resolver::APP_DIR_NAME),
            )?;
            env.runner
                .run_checked(&format!("cd {root_dir} && {scaffold}"), RunOptions::elevated())?;
            changed = true;
        }

        for command in [
            format!("chown -R {operator}:www-data ."),
            format!("adduser www-data {operator}"),
            format!("chmod 775 . log {project}"),
            format!("chmod 750 manage.py ./{project}/*.py"),
        ] {
            env.runner
                .run_checked(&format!("cd {app_dir} && {command}"), RunOptions::elevated())?;
        }
        Ok(outcome(changed))
    }
}

/// Fill database credentials and server name into `settings.py`
#[derive(Debug)]
pub struct Settings;

impl Step<Session> for Settings {
    fn id(&self) -> &'static str {
        "settings"
    }

    fn description(&self) -> String {
        "Configure project settings".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs, Need::Server, Need::Database]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let use_sudo = ctx.use_sudo()?;
        let path = format!("{}/{}/settings.py", ctx.app_dir()?, ctx.project_name()?);

        let Some(current) = env.runner.read_file(&path, use_sudo)? else {
            return Err(Error::MissingTarget { path });
        };

        let rendered = render(
            &current,
            &[
                ("<user>", ctx.db_user()?),
                ("<password>", ctx.db_password()?),
                ("<domain>", ctx.server_name()?),
                ("DEBUG = True", "DEBUG = False"),
            ],
        )?;

        if rendered == current {
            return Ok(StepOutcome::NoChange);
        }
        env.runner.write_file(&path, &rendered, use_sudo)?;
        Ok(StepOutcome::Changed)
    }
}

/// Which flavor of database synchronization to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// First install: load initial data
    Install,
    /// Existing install: keep the data already there
    Update,
}

impl SyncMode {
    fn commands(self) -> &'static [&'static str] {
        match self {
            Self::Install => &[
                "./manage.py syncdb --noinput",
                "./manage.py migrate",
                "./manage.py collectstatic --noinput",
            ],
            Self::Update => &[
                "./manage.py syncdb --no-initial-data --noinput",
                "./manage.py migrate --no-initial-data",
                "./manage.py collectstatic --noinput",
            ],
        }
    }
}

/// Create tables, run migrations, collect static files
#[derive(Debug)]
pub struct SyncData(pub SyncMode);

impl Step<Session> for SyncData {
    fn id(&self) -> &'static str {
        "sync-data"
    }

    fn description(&self) -> String {
        match self.0 {
            SyncMode::Install => "Initialize the database".into(),
            SyncMode::Update => "Migrate the database".into(),
        }
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let app_dir = ctx.app_dir()?;
        for command in self.0.commands() {
            let command = format!("cd {app_dir} && {}", in_virtualenv(ctx, command)?);
            env.runner.run_checked(&command, RunOptions::plain())?;
        }
        Ok(StepOutcome::Changed)
    }
}

/// Default `admin` superuser, created only once
#[derive(Debug)]
pub struct CreateAdmin;

const PROFILE_MODEL: &str = "from nodeshot.community.profiles.models import Profile";

impl CreateAdmin {
    fn shell(ctx: &crate::resolver::ProvisioningContext, python: &str) -> workflow::Result<String> {
        let piped = format!(
            "echo {} | ./manage.py shell",
            shell_words::quote(&format!("{PROFILE_MODEL}; {python}"))
        );
        Ok(format!("cd {} && {}", ctx.app_dir()?, in_virtualenv(ctx, &piped)?))
    }
}

impl Step<Session> for CreateAdmin {
    fn id(&self) -> &'static str {
        "create-admin"
    }

    fn description(&self) -> String {
        "Create the admin superuser".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();

        let check = Self::shell(
            ctx,
            "print(Profile.objects.filter(username='admin').exists())",
        )?;
        let exists = env.runner.run_capture(&check, RunOptions::quiet())?;
        if exists.lines().any(|line| line.trim() == "True") {
            return Ok(StepOutcome::NoChange);
        }

        let create = Self::shell(ctx, "Profile.objects.create_superuser('admin', '', 'admin')")?;
        env.runner.run_checked(&create, RunOptions::quiet())?;
        log::warn!("created superuser admin/admin, change its password");
        Ok(StepOutcome::Changed)
    }
}

/// Abort an update when there is nothing installed to update
#[derive(Debug)]
pub struct VerifyInstallation;

impl Step<Session> for VerifyInstallation {
    fn id(&self) -> &'static str {
        "verify-installation"
    }

    fn description(&self) -> String {
        "Check for an existing installation".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let app_dir = session.context().app_dir()?;
        if !env.runner.path_exists(app_dir)? {
            return Err(Error::MissingTarget {
                path: app_dir.to_string(),
            });
        }
        Ok(StepOutcome::NoChange)
    }
}
