//! Host preparation: working directory, certificate, packages, cleanup

use workflow::{RunOptions, Step, StepEnv, StepOutcome};

use super::{SSL_DIR, outcome};
use crate::resolver::{Need, Session};
use crate::templates;

const POSTGIS_VERSION: &str = "2.1.3";

#[derive(Debug)]
pub struct WorkingDir;

impl Step<Session> for WorkingDir {
    fn id(&self) -> &'static str {
        "working-dir"
    }

    fn description(&self) -> String {
        "Create the temporary working directory".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let tmp_dir = session.context().tmp_dir()?;
        if env.runner.path_exists(tmp_dir)? {
            return Ok(StepOutcome::NoChange);
        }
        env.runner
            .run_checked(&format!("mkdir -p {tmp_dir}"), RunOptions::quiet())?;
        Ok(StepOutcome::Changed)
    }
}

/// Self-signed certificate for the reverse proxy
#[derive(Debug)]
pub struct SslCertificate;

impl Step<Session> for SslCertificate {
    fn id(&self) -> &'static str {
        "ssl-cert"
    }

    fn description(&self) -> String {
        "Generate a self-signed SSL certificate".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs, Need::Server]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let tmp_dir = ctx.tmp_dir()?;
        let mut changed = false;

        if !env.runner.run_status("which openssl", RunOptions::quiet())? {
            log::info!("openssl missing, installing it");
            env.runner
                .run_checked("apt-get install -y openssl", RunOptions::elevated())?;
            changed = true;
        }

        // an installed certificate is never replaced
        if env.runner.path_exists(&format!("{SSL_DIR}/server.crt"))? {
            return Ok(outcome(changed));
        }

        let subject = format!("/CN={}", ctx.server_name()?);
        env.runner.run_checked(
            &format!(
                "cd {tmp_dir} && openssl req -new -x509 -nodes -days 365 -subj {} -out server.crt -keyout server.key",
                shell_words::quote(&subject)
            ),
            RunOptions::quiet(),
        )?;
        Ok(StepOutcome::Changed)
    }
}

/// System packages, plus PostGIS built from source
#[derive(Debug)]
pub struct Dependencies;

impl Dependencies {
    fn postgis_installed(env: &StepEnv<'_>) -> workflow::Result<bool> {
        env.runner.run_status(
            r#"dpkg --get-selections | grep -q "^postgis\s""#,
            RunOptions::quiet(),
        )
    }
}

/// Whether `apt-get install` output reports upgraded or new packages
///
/// Output without the summary line counts as a change.
fn apt_changed(stdout: &str) -> bool {
    let Some(summary) = stdout.lines().find(|l| l.contains("newly installed")) else {
        return true;
    };
    summary
        .split(',')
        .filter(|part| part.contains("upgraded") || part.contains("newly installed"))
        .filter(|part| !part.contains("not upgraded"))
        .any(|part| {
            part.split_whitespace()
                .next()
                .and_then(|n| n.parse::<u32>().ok())
                .is_none_or(|n| n > 0)
        })
}

impl Step<Session> for Dependencies {
    fn id(&self) -> &'static str {
        "dependencies"
    }

    fn description(&self) -> String {
        "Install system dependencies".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Platform, Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let platform = ctx.platform()?;
        let tmp_dir = ctx.tmp_dir()?;
        let packages = platform.apply_substitutions(&templates::dependencies());

        env.runner
            .run_checked("apt-get update -y", RunOptions::elevated())?;
        let apt = env.runner.run_checked(
            &format!("apt-get install -y {}", packages.join(" ")),
            RunOptions::plain().with_elevate(true),
        )?;

        if Self::postgis_installed(env)? {
            log::debug!("postgis already installed");
            return Ok(outcome(apt_changed(&apt.stdout_str())));
        }

        log::info!("building PostGIS {POSTGIS_VERSION} from source");
        let source = format!("{tmp_dir}/postgis-{POSTGIS_VERSION}");
        let mut commands = vec![
            format!(
                "cd {tmp_dir} && wget -q http://download.osgeo.org/postgis/source/postgis-{POSTGIS_VERSION}.tar.gz"
            ),
            format!("cd {tmp_dir} && tar xfz postgis-{POSTGIS_VERSION}.tar.gz"),
            format!("cd {source} && ./configure"),
            format!("cd {source} && make"),
        ];
        if platform == crate::platform::Platform::Debian7 {
            commands.push(format!(
                "mkdir -p /usr/share/postgresql/{}/contrib/postgis-2.1",
                platform.postgres_version()
            ));
        }
        commands.push(format!("cd {source} && checkinstall -y"));

        for command in &commands {
            env.runner.run_checked(command, RunOptions::elevated())?;
        }
        Ok(StepOutcome::Changed)
    }
}

/// Remove the temporary working directory
#[derive(Debug)]
pub struct Cleanup;

impl Step<Session> for Cleanup {
    fn id(&self) -> &'static str {
        "cleanup"
    }

    fn description(&self) -> String {
        "Remove the temporary working directory".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let tmp_dir = session.context().tmp_dir()?;
        if !env.runner.path_exists(tmp_dir)? {
            return Ok(StepOutcome::NoChange);
        }
        env.runner
            .run_checked(&format!("rm -rf {tmp_dir}"), RunOptions::elevated())?;
        Ok(StepOutcome::Changed)
    }
}
