//! Reverse proxy, application server and process supervision

use workflow::{ManagedFile, RunOptions, Step, StepEnv, StepOutcome, render, unresolved_placeholders};

use super::{SSL_DIR, outcome};
use crate::resolver::{Need, ProvisioningContext, Session};
use crate::templates;

const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";
const SUPERVISOR_DIR: &str = "/etc/supervisor/conf.d";

/// Render a template, warning about placeholders it still contains
fn render_checked(template: &str, subs: &[(&str, &str)], target: &str) -> workflow::Result<String> {
    let rendered = render(template, subs)?;
    let leftover = unresolved_placeholders(&rendered);
    if !leftover.is_empty() {
        log::warn!("{target} still contains {}", leftover.join(", "));
    }
    Ok(rendered)
}

/// Substitutions shared by the uwsgi and supervisor templates
fn runtime_subs(ctx: &ProvisioningContext) -> workflow::Result<[(&'static str, String); 3]> {
    Ok([
        (templates::APP_DIR, ctx.app_dir()?.to_string()),
        (templates::PROJECT_NAME, ctx.project_name()?.to_string()),
        (templates::PYTHON_HOME, ctx.python_home()?),
    ])
}

fn as_pairs<'a>(subs: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    subs.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

/// nginx site with the self-signed certificate
#[derive(Debug)]
pub struct ReverseProxy;

impl Step<Session> for ReverseProxy {
    fn id(&self) -> &'static str {
        "reverse-proxy"
    }

    fn description(&self) -> String {
        "Configure nginx".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs, Need::Server]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let tmp_dir = ctx.tmp_dir()?;
        let app_dir = ctx.app_dir()?;
        let server_name = ctx.server_name()?;

        let mut changed = false;
        env.runner
            .run_checked(&format!("mkdir -p {SSL_DIR}"), RunOptions::elevated())?;
        if !env.runner.path_exists(&format!("{SSL_DIR}/server.crt"))? {
            env.runner.run_checked(
                &format!("cp {tmp_dir}/server.crt {tmp_dir}/server.key {SSL_DIR}/"),
                RunOptions::elevated(),
            )?;
            changed = true;
        }
        for command in [
            format!("cp /etc/nginx/uwsgi_params {SITES_AVAILABLE}/"),
            format!("mkdir -p {app_dir}/public_html"),
        ] {
            env.runner.run_checked(&command, RunOptions::elevated())?;
        }

        let site = format!("{SITES_AVAILABLE}/{server_name}");
        let conf = render_checked(
            templates::NGINX_SITE,
            &[
                (templates::SERVER_NAME, server_name),
                (templates::APP_DIR, app_dir),
                (templates::PROJECT_NAME, ctx.project_name()?),
            ],
            &site,
        )?;
        changed |= ManagedFile::new(&site, "nginx", ctx.use_sudo()?).apply(env.runner, &conf)?;

        env.runner.run_checked(
            &format!("ln -sf {site} {SITES_ENABLED}/{server_name}"),
            RunOptions::elevated(),
        )?;
        env.runner
            .run_checked("service nginx configtest", RunOptions::elevated())?;
        Ok(outcome(changed))
    }
}

/// uwsgi, configured through `uwsgi.ini` in the app directory
#[derive(Debug)]
pub struct AppServer;

impl Step<Session> for AppServer {
    fn id(&self) -> &'static str {
        "app-server"
    }

    fn description(&self) -> String {
        "Install and configure uwsgi".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        env.runner
            .run_checked("pip install uwsgi", RunOptions::elevated())?;

        let path = format!("{}/uwsgi.ini", ctx.app_dir()?);
        let subs = runtime_subs(ctx)?;
        let ini = render_checked(templates::UWSGI_INI, &as_pairs(&subs), &path)?;
        let changed = ManagedFile::new(&path, "uwsgi", ctx.use_sudo()?).apply(env.runner, &ini)?;
        Ok(outcome(changed))
    }
}

/// Supervisor programs for uwsgi, the celery worker and celery beat
#[derive(Debug)]
pub struct Supervisor;

impl Supervisor {
    /// (file name, template) for every supervised program
    pub const PROGRAMS: [(&'static str, &'static str); 3] = [
        ("uwsgi.conf", templates::UWSGI_PROGRAM),
        ("celery.conf", templates::CELERY_PROGRAM),
        ("celery-beat.conf", templates::CELERY_BEAT_PROGRAM),
    ];
}

impl Step<Session> for Supervisor {
    fn id(&self) -> &'static str {
        "supervisor"
    }

    fn description(&self) -> String {
        "Configure supervisor programs".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let subs = runtime_subs(ctx)?;
        let pairs = as_pairs(&subs);
        let use_sudo = ctx.use_sudo()?;
        let mut changed = false;

        for (file, template) in Self::PROGRAMS {
            let path = format!("{SUPERVISOR_DIR}/{file}");
            let program = render_checked(template, &pairs, &path)?;
            let marker = file.trim_end_matches(".conf");
            changed |= ManagedFile::new(&path, marker, use_sudo).apply(env.runner, &program)?;
        }

        env.runner
            .run_checked("supervisorctl update", RunOptions::elevated())?;
        Ok(outcome(changed))
    }
}
