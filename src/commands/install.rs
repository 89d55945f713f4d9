//! Install command - provision the whole stack on a fresh host

use anyhow::Result;

use crate::Context as AppContext;
use crate::cli::InstallArgs;
use crate::resolver::{Defaults, ResolveMode, Session};
use crate::{steps, ui};

pub fn run(ctx: &AppContext, args: InstallArgs) -> Result<()> {
    if !ctx.quiet {
        ui::banner();
    }
    ui::header("Install");

    let connection = super::connect(ctx)?;
    let mode = ResolveMode::from_flag(args.defaults);
    if mode == ResolveMode::Defaults {
        ui::warn("Taking every default without prompting");
    }
    let defaults = Defaults::for_host(&connection.target.host).with_config(&connection.config.defaults);

    let mut session = Session::new(defaults, mode);
    if let Some(server_name) = args.server_name {
        session.preset_server_name(server_name);
    }

    ui::kv("host", &connection.target.to_string());
    let workflow = steps::install(connection.config.health.poll_config());
    let summary = super::provision(ctx, &workflow, &mut session, connection.runner.as_ref(), mode)?;

    super::print_summary(&summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::resolver::{Defaults, Need, ResolveMode, Session};
    use crate::steps;
    use crate::testing::FakeHost;
    use std::time::Duration;
    use workflow::{
        DefaultsPrompter, NoProgress, PollConfig, RunSummary, StepEnv, StepState, WorkflowError,
        execute,
    };

    const SETTINGS_PATH: &str = "/var/www/nodeshot/myproject/settings.py";

    fn fresh_host(banner: &str) -> FakeHost {
        scripted(FakeHost::new(), banner)
    }

    /// Answers for a clean host; rules already on `host` take precedence
    fn scripted(host: FakeHost, banner: &str) -> FakeHost {
        host.on("cat /etc/issue", banner)
            .on("echo $HOME", "/home/deploy")
            .on("id -un", "deploy")
            .on("pg_roles", "")
            .on("exists()", "False")
            .on("supervisorctl status celery-beat", "celery-beat RUNNING pid 3, uptime 0:00:04")
            .on("supervisorctl status celery", "celery RUNNING pid 2, uptime 0:00:04")
            .on("supervisorctl status uwsgi", "uwsgi RUNNING pid 1, uptime 0:00:04")
            .with_file(
                SETTINGS_PATH,
                "DEBUG = True\nUSER = '<user>'\nPASSWORD = '<password>'\nDOMAIN = '<domain>'\n",
            )
            .unprivileged()
    }

    fn install(host: &FakeHost) -> (Session, Result<RunSummary, WorkflowError>) {
        let mut session = Session::new(Defaults::for_host("node.example.org"), ResolveMode::Defaults);
        let workflow = steps::install(PollConfig::new(Duration::ZERO, 3));
        let mut prompter = DefaultsPrompter;
        let mut env = StepEnv::new(host, &mut prompter);
        let result = execute(&workflow, &mut session, &mut env, &mut NoProgress);
        (session, result)
    }

    #[test]
    fn test_install_on_1404_uses_postgres_93() {
        let host = fresh_host("Ubuntu 14.04.1 LTS \\n \\l");
        let (session, result) = install(&host);
        let summary = result.unwrap();

        assert_eq!(summary.total(), 21);
        assert_eq!(summary.step_ids().last(), Some(&"completion-notice"));

        let apt = host
            .commands()
            .into_iter()
            .find(|c| c.starts_with("apt-get install -y build-essential"))
            .unwrap();
        assert!(apt.contains("postgresql-9.3"));
        assert!(!apt.contains("postgresql-9.1"));

        let ctx = session.context();
        let password = ctx.db_password().unwrap();
        assert_eq!(password.len(), 12);

        let settings = host.file(SETTINGS_PATH).unwrap();
        assert!(settings.contains("DEBUG = False"));
        assert!(settings.contains(&format!("PASSWORD = '{password}'")));
        assert!(settings.contains("DOMAIN = 'node.example.org'"));
    }

    #[test]
    fn test_install_on_unsupported_platform_aborts_first() {
        let host = fresh_host("CentOS Linux 7 (Core)");
        let (_, result) = install(&host);
        let err = result.unwrap_err();

        assert_eq!(err.step, "detect-platform");
        assert_eq!(err.index, 0);
        assert_eq!(err.completed.total(), 0);
        assert!(matches!(err.source, workflow::Error::UnsupportedPlatform { .. }));
        assert!(!host.ran("apt-get"));
        assert!(!host.ran("mkdir"));
    }

    #[test]
    fn test_install_twice_does_not_duplicate_config() {
        let host = fresh_host("Ubuntu 12.04.5 LTS");
        install(&host).1.unwrap();
        let site = host.file("/etc/nginx/sites-available/node.example.org").unwrap();
        let profile = host.file("/home/deploy/.bash_profile").unwrap();

        // what the real commands of the first run leave behind
        let host = host
            .with_dir("/home/deploy/.virtualenvs/nodeshot")
            .with_file("/var/www/nodeshot/manage.py", "")
            .with_file("/etc/nginx/ssl/server.crt", "CERT");
        let (_, result) = install(&host);
        let summary = result.unwrap();
        for id in [
            "ssl-cert",
            "settings",
            "virtualenv",
            "create-project",
            "reverse-proxy",
            "mail-relay",
        ] {
            let record = summary.steps.iter().find(|s| s.id == id).unwrap();
            assert!(!record.outcome.is_change(), "{id} changed on rerun");
        }

        assert_eq!(host.file("/etc/nginx/sites-available/node.example.org").unwrap(), site);
        assert_eq!(host.file("/home/deploy/.bash_profile").unwrap(), profile);
        let main_cf = host.file("/etc/postfix/main.cf").unwrap();
        assert_eq!(main_cf.matches("# BEGIN stackup postfix").count(), 1);

        let count = |pattern: &str| host.commands().iter().filter(|c| c.contains(pattern)).count();
        assert_eq!(count("openssl req"), 1);
        assert_eq!(count("server.crt /etc/nginx/ssl/"), 1);
    }

    #[test]
    fn test_install_elevates_only_system_changes() {
        let host = fresh_host("Ubuntu 14.04 LTS");
        install(&host).1.unwrap();

        for pattern in [
            "apt-get update",
            "apt-get install -y build-essential",
            "pip install virtualenvwrapper",
            "/root/.bashrc",
            "su - postgres",
            "/etc/nginx/sites-available/node.example.org",
            "mkdir -p /etc/nginx/ssl",
            "server.crt /etc/nginx/ssl/",
            "/etc/supervisor/conf.d/",
            "supervisorctl",
            "/etc/postfix/main.cf",
            "rm -rf /home/deploy/nodeshot_install",
        ] {
            assert!(host.ran_elevated(pattern), "{pattern} not elevated");
        }
        for pattern in [
            "/home/deploy/.bash_profile",
            "mkvirtualenv",
            "pip install -U distribute",
            "syncdb",
            "openssl req",
        ] {
            assert!(host.ran_unelevated(pattern), "{pattern} elevated");
        }
    }

    #[test]
    fn test_install_fails_when_service_does_not_start() {
        let host = scripted(
            FakeHost::new()
                .on("supervisorctl status uwsgi", "uwsgi FATAL Exited too quickly")
                .fail("dpkg --get-selections", ""),
            "Debian GNU/Linux 7 \\n \\l",
        );

        let (_, result) = install(&host);
        let err = result.unwrap_err();
        assert_eq!(err.step, "health-check");
        assert!(matches!(
            err.source,
            workflow::Error::ServiceFailed { ref process, .. } if process == "uwsgi"
        ));
        assert_eq!(err.completed.total(), 19);
        assert!(host.ran("mkdir -p /usr/share/postgresql/9.1/contrib/postgis-2.1"));
    }

    #[test]
    fn test_server_name_resolved_once_across_steps() {
        let host = fresh_host("Ubuntu 13.10");
        let mut session = Session::new(Defaults::for_host("node.example.org"), ResolveMode::Defaults);
        session.preset_server_name("maps.example.net");
        let workflow = steps::install(PollConfig::new(Duration::ZERO, 3));
        let mut prompter = DefaultsPrompter;
        let mut env = StepEnv::new(&host, &mut prompter);

        execute(&workflow, &mut session, &mut env, &mut NoProgress).unwrap();

        assert!(session.is_satisfied(Need::Server));
        assert_eq!(session.context().server_name().unwrap(), "maps.example.net");
        assert!(host.file("/etc/nginx/sites-available/maps.example.net").is_some());
    }
}
