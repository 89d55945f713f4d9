//! Configuration resolution
//!
//! Values a step needs are resolved lazily, just before the first step that
//! declares the matching [`Need`], either by asking the operator or by
//! taking the defaults. Every value is written at most once per run, so a
//! value resolved early is never asked for again.

use std::fmt;

use rand::Rng;
use workflow::{Error, RunOptions, StepEnv, StepState};

use crate::config::DefaultsConfig;
use crate::platform::{self, Platform};

/// Characters used for generated passwords
pub const PASSWORD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated passwords
pub const PASSWORD_LENGTH: usize = 12;

/// Directory name of the application under the install root
pub const APP_DIR_NAME: &str = "nodeshot";

/// Scratch directory name under the acting user's home
pub const TMP_DIR_NAME: &str = "nodeshot_install";

/// Generate a random password from [`PASSWORD_ALPHABET`]
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LENGTH)
        .map(|_| char::from(PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())]))
        .collect()
}

/// Resolved values for one provisioning run
#[derive(Clone, Default)]
pub struct ProvisioningContext {
    root_dir: Option<String>,
    project_name: Option<String>,
    app_dir: Option<String>,
    home_dir: Option<String>,
    operator: Option<String>,
    tmp_dir: Option<String>,
    db_user: Option<String>,
    db_password: Option<String>,
    server_name: Option<String>,
    platform: Option<Platform>,
    use_sudo: Option<bool>,
}

/// Write `value` only if nothing was resolved yet
fn set_once<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

fn get<'a>(slot: &'a Option<String>, name: &'static str) -> workflow::Result<&'a str> {
    slot.as_deref().ok_or(Error::Unresolved(name))
}

impl ProvisioningContext {
    /// Installation root, e.g. `/var/www`
    pub fn root_dir(&self) -> workflow::Result<&str> {
        get(&self.root_dir, "install directory")
    }

    pub fn project_name(&self) -> workflow::Result<&str> {
        get(&self.project_name, "project name")
    }

    /// Application directory, always `<root_dir>/nodeshot`
    pub fn app_dir(&self) -> workflow::Result<&str> {
        get(&self.app_dir, "application directory")
    }

    /// Home directory of the acting user on the managed host
    pub fn home_dir(&self) -> workflow::Result<&str> {
        get(&self.home_dir, "home directory")
    }

    /// Login name of the acting user on the managed host
    pub fn operator(&self) -> workflow::Result<&str> {
        get(&self.operator, "acting user")
    }

    /// Scratch directory, `<home>/nodeshot_install`
    pub fn tmp_dir(&self) -> workflow::Result<&str> {
        get(&self.tmp_dir, "working directory")
    }

    pub fn db_user(&self) -> workflow::Result<&str> {
        get(&self.db_user, "database user")
    }

    pub fn db_password(&self) -> workflow::Result<&str> {
        get(&self.db_password, "database password")
    }

    pub fn server_name(&self) -> workflow::Result<&str> {
        get(&self.server_name, "server name")
    }

    pub fn platform(&self) -> workflow::Result<Platform> {
        self.platform.ok_or(Error::Unresolved("platform"))
    }

    /// Whether privileged commands go through sudo
    pub fn use_sudo(&self) -> workflow::Result<bool> {
        self.use_sudo.ok_or(Error::Unresolved("privilege elevation"))
    }

    /// Virtualenv root, `<home>/.virtualenvs`
    pub fn workon_home(&self) -> workflow::Result<String> {
        Ok(format!("{}/.virtualenvs", self.home_dir()?))
    }

    /// Python home of the application virtualenv
    pub fn python_home(&self) -> workflow::Result<String> {
        Ok(format!("{}/{}", self.workon_home()?, crate::steps::VIRTUALENV))
    }

    fn has_dirs(&self) -> bool {
        self.root_dir.is_some()
            && self.project_name.is_some()
            && self.app_dir.is_some()
            && self.home_dir.is_some()
            && self.operator.is_some()
            && self.tmp_dir.is_some()
            && self.use_sudo.is_some()
    }
}

impl fmt::Debug for ProvisioningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningContext")
            .field("root_dir", &self.root_dir)
            .field("project_name", &self.project_name)
            .field("app_dir", &self.app_dir)
            .field("tmp_dir", &self.tmp_dir)
            .field("db_user", &self.db_user)
            .field("db_password", &self.db_password.as_ref().map(|_| "<redacted>"))
            .field("server_name", &self.server_name)
            .field("platform", &self.platform)
            .field("use_sudo", &self.use_sudo)
            .finish_non_exhaustive()
    }
}

/// Built-in default values, optionally overridden by the config file
#[derive(Clone)]
pub struct Defaults {
    pub root_dir: String,
    pub project_name: String,
    pub db_user: String,
    pub db_password: String,
    pub server_name: String,
}

impl Defaults {
    /// Defaults for provisioning `host`
    pub fn for_host(host: &str) -> Self {
        Self {
            root_dir: "/var/www".to_string(),
            project_name: "myproject".to_string(),
            db_user: "nodeshot".to_string(),
            db_password: generate_password(),
            server_name: host.to_string(),
        }
    }

    /// Apply values from the `[defaults]` config section
    pub fn with_config(mut self, config: &DefaultsConfig) -> Self {
        if let Some(root_dir) = &config.root_dir {
            self.root_dir.clone_from(root_dir);
        }
        if let Some(project_name) = &config.project_name {
            self.project_name.clone_from(project_name);
        }
        if let Some(db_user) = &config.db_user {
            self.db_user.clone_from(db_user);
        }
        if let Some(db_password) = &config.db_password {
            self.db_password.clone_from(db_password);
        }
        if let Some(server_name) = &config.server_name {
            self.server_name.clone_from(server_name);
        }
        self
    }
}

/// How missing values are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Ask the operator, suggesting the default
    Interactive,
    /// Take every default without asking
    Defaults,
}

impl ResolveMode {
    /// Mode for a `--defaults` flag
    pub fn from_flag(defaults: bool) -> Self {
        if defaults {
            Self::Defaults
        } else {
            Self::Interactive
        }
    }
}

/// Groups of values a step can require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    /// The managed host's OS release
    Platform,
    /// Install root, project name and the derived directories
    Dirs,
    /// Public server name
    Server,
    /// Database credentials
    Database,
}

/// Resolution state for one run
pub struct Session {
    context: ProvisioningContext,
    defaults: Defaults,
    mode: ResolveMode,
}

impl Session {
    pub fn new(defaults: Defaults, mode: ResolveMode) -> Self {
        Self {
            context: ProvisioningContext::default(),
            defaults,
            mode,
        }
    }

    /// Pre-fill the install directory so it is never asked for
    pub fn preset_root_dir(&mut self, root_dir: impl Into<String>) {
        set_once(&mut self.context.root_dir, normalize_dir(&root_dir.into()));
    }

    /// Pre-fill the project name so it is never asked for
    pub fn preset_project_name(&mut self, project_name: impl Into<String>) {
        set_once(&mut self.context.project_name, project_name.into());
    }

    /// Presets for `update`: a named project without a root dir lives under
    /// the default root, so neither value is asked for
    pub fn preset_update_target(&mut self, root_dir: Option<String>, project: Option<String>) {
        match (root_dir, &project) {
            (Some(root_dir), _) => self.preset_root_dir(root_dir),
            (None, Some(_)) => self.preset_root_dir(self.defaults.root_dir.clone()),
            (None, None) => {}
        }
        if let Some(project) = project {
            self.preset_project_name(project);
        }
    }

    /// Pre-fill the server name so it is never asked for
    pub fn preset_server_name(&mut self, server_name: impl Into<String>) {
        set_once(&mut self.context.server_name, server_name.into());
    }

    pub fn context(&self) -> &ProvisioningContext {
        &self.context
    }

    fn ask(&self, env: &mut StepEnv<'_>, message: &str, default: &str) -> workflow::Result<String> {
        let answer = match self.mode {
            ResolveMode::Defaults => default.to_string(),
            ResolveMode::Interactive => env.prompter.prompt(message, default)?,
        };
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer.to_string()
        })
    }

    fn resolve_platform(&mut self, env: &mut StepEnv<'_>) -> workflow::Result<()> {
        let platform = platform::detect(env.runner)?;
        set_once(&mut self.context.platform, platform);
        Ok(())
    }

    fn resolve_dirs(&mut self, env: &mut StepEnv<'_>) -> workflow::Result<()> {
        if self.context.root_dir.is_none() {
            let root_dir = self.ask(env, "Set install directory", &self.defaults.root_dir)?;
            set_once(&mut self.context.root_dir, normalize_dir(&root_dir));
        }
        if self.context.project_name.is_none() {
            let project_name = self.ask(env, "Set project name", &self.defaults.project_name)?;
            set_once(&mut self.context.project_name, project_name);
        }

        let app_dir = join_dir(self.context.root_dir()?, APP_DIR_NAME);
        set_once(&mut self.context.app_dir, app_dir);

        if self.context.home_dir.is_none() {
            let home = env.runner.run_capture("echo $HOME", RunOptions::quiet())?;
            set_once(&mut self.context.home_dir, home);
        }
        if self.context.operator.is_none() {
            let operator = env.runner.run_capture("id -un", RunOptions::quiet())?;
            set_once(&mut self.context.operator, operator);
        }

        let tmp_dir = join_dir(self.context.home_dir()?, TMP_DIR_NAME);
        set_once(&mut self.context.tmp_dir, tmp_dir);

        if self.context.use_sudo.is_none() {
            let use_sudo = !env.runner.is_privileged()?;
            set_once(&mut self.context.use_sudo, use_sudo);
        }

        log::info!(
            "installing {} into {}",
            self.context.project_name()?,
            self.context.app_dir()?
        );
        Ok(())
    }

    fn resolve_server(&mut self, env: &mut StepEnv<'_>) -> workflow::Result<()> {
        if self.context.server_name.is_none() {
            let server_name = self.ask(env, "Server name", &self.defaults.server_name)?;
            set_once(&mut self.context.server_name, server_name);
        }
        log::debug!("server name: {}", self.context.server_name()?);
        Ok(())
    }

    fn resolve_database(&mut self, env: &mut StepEnv<'_>) -> workflow::Result<()> {
        if self.context.db_user.is_none() {
            let db_user = self.ask(env, "Set database user", &self.defaults.db_user)?;
            set_once(&mut self.context.db_user, db_user);
        }
        if self.context.db_password.is_none() {
            let db_password =
                self.ask(env, "Set database user password", &self.defaults.db_password)?;
            set_once(&mut self.context.db_password, db_password);
        }
        log::debug!("database user: {}", self.context.db_user()?);
        Ok(())
    }
}

impl StepState for Session {
    type Requirement = Need;

    fn is_satisfied(&self, need: Need) -> bool {
        match need {
            Need::Platform => self.context.platform.is_some(),
            Need::Dirs => self.context.has_dirs(),
            Need::Server => self.context.server_name.is_some(),
            Need::Database => {
                self.context.db_user.is_some() && self.context.db_password.is_some()
            }
        }
    }

    fn satisfy(&mut self, need: Need, env: &mut StepEnv<'_>) -> workflow::Result<()> {
        match need {
            Need::Platform => self.resolve_platform(env),
            Need::Dirs => self.resolve_dirs(env),
            Need::Server => self.resolve_server(env),
            Need::Database => self.resolve_database(env),
        }
    }
}

/// Strip trailing slashes, keeping `/` itself
fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `dir/name` without doubling the separator when `dir` is `/`
fn join_dir(dir: &str, name: &str) -> String {
    format!("{}/{name}", dir.trim_end_matches('/'))
}

/// Prompts on the terminal with `dialoguer`
pub struct TerminalPrompter;

impl workflow::Prompter for TerminalPrompter {
    fn prompt(&mut self, message: &str, default: &str) -> workflow::Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(message)
            .default(default.to_string())
            .interact_text()
            .map_err(|e| Error::Other(format!("Failed to read input: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use workflow::Prompter;

    /// Answers from a script and records every question
    struct ScriptedPrompter {
        answers: Vec<&'static str>,
        asked: Vec<String>,
    }

    impl ScriptedPrompter {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.to_vec(),
                asked: Vec::new(),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn prompt(&mut self, message: &str, default: &str) -> workflow::Result<String> {
            self.asked.push(message.to_string());
            if self.answers.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(self.answers.remove(0).to_string())
            }
        }
    }

    /// Fails the test if asked anything
    struct Refuse;

    impl Prompter for Refuse {
        fn prompt(&mut self, message: &str, _default: &str) -> workflow::Result<String> {
            panic!("unexpected prompt: {message}");
        }
    }

    fn host() -> FakeHost {
        FakeHost::new()
            .on("echo $HOME", "/home/deploy\n")
            .on("id -un", "deploy\n")
            .on("cat /etc/issue", "Ubuntu 12.04.5 LTS \\n \\l")
            .unprivileged()
    }

    fn defaults() -> Defaults {
        Defaults::for_host("node.example.org")
    }

    #[test]
    fn test_generate_password_shape() {
        for _ in 0..50 {
            let password = generate_password();
            assert_eq!(password.len(), PASSWORD_LENGTH);
            assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
        }
        assert_ne!(generate_password(), generate_password());
    }

    #[test]
    fn test_defaults_mode_never_prompts() {
        let host = host();
        let mut prompter = Refuse;
        let mut env = StepEnv::new(&host, &mut prompter);
        let mut session = Session::new(defaults(), ResolveMode::Defaults);

        for need in [Need::Platform, Need::Dirs, Need::Server, Need::Database] {
            session.satisfy(need, &mut env).unwrap();
            assert!(session.is_satisfied(need));
        }

        let ctx = session.context();
        assert_eq!(ctx.root_dir().unwrap(), "/var/www");
        assert_eq!(ctx.project_name().unwrap(), "myproject");
        assert_eq!(ctx.app_dir().unwrap(), "/var/www/nodeshot");
        assert_eq!(ctx.tmp_dir().unwrap(), "/home/deploy/nodeshot_install");
        assert_eq!(ctx.db_user().unwrap(), "nodeshot");
        assert_eq!(ctx.server_name().unwrap(), "node.example.org");
        assert_eq!(ctx.platform().unwrap(), Platform::Ubuntu1204);
        assert!(ctx.use_sudo().unwrap());

        let password = ctx.db_password().unwrap();
        assert_eq!(password.len(), 12);
        assert!(password.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_interactive_prompts_in_order() {
        let host = host();
        let mut prompter = ScriptedPrompter::new(&["/srv/", "mesh", "map.example.net", "ns", "s3cret"]);
        let mut session = Session::new(defaults(), ResolveMode::Interactive);
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Dirs, &mut env).unwrap();
            session.satisfy(Need::Server, &mut env).unwrap();
            session.satisfy(Need::Database, &mut env).unwrap();
        }

        assert_eq!(
            prompter.asked,
            vec![
                "Set install directory",
                "Set project name",
                "Server name",
                "Set database user",
                "Set database user password",
            ]
        );
        let ctx = session.context();
        assert_eq!(ctx.root_dir().unwrap(), "/srv");
        assert_eq!(ctx.app_dir().unwrap(), "/srv/nodeshot");
        assert_eq!(ctx.project_name().unwrap(), "mesh");
        assert_eq!(ctx.server_name().unwrap(), "map.example.net");
        assert_eq!(ctx.db_user().unwrap(), "ns");
        assert_eq!(ctx.db_password().unwrap(), "s3cret");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let host = host();
        let mut prompter = ScriptedPrompter::new(&[]);
        let mut session = Session::new(defaults(), ResolveMode::Interactive);
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Dirs, &mut env).unwrap();
            // satisfied requirements are not resolved again, even if asked
            session.satisfy(Need::Dirs, &mut env).unwrap();
        }
        assert_eq!(prompter.asked.len(), 2);
        assert_eq!(host.commands().iter().filter(|c| *c == "echo $HOME").count(), 1);
    }

    #[test]
    fn test_presets_are_not_prompted() {
        let host = host();
        let mut prompter = ScriptedPrompter::new(&[]);
        let mut session = Session::new(defaults(), ResolveMode::Interactive);
        session.preset_root_dir("/opt/apps/");
        session.preset_project_name("community");
        session.preset_server_name("preset.example.org");
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Dirs, &mut env).unwrap();
        }

        assert!(prompter.asked.is_empty());
        assert!(session.is_satisfied(Need::Server));
        assert_eq!(session.context().app_dir().unwrap(), "/opt/apps/nodeshot");
    }

    #[test]
    fn test_empty_answer_takes_default() {
        let host = host();
        let mut prompter = ScriptedPrompter::new(&["   "]);
        let mut session = Session::new(defaults(), ResolveMode::Interactive);
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Server, &mut env).unwrap();
        }
        assert_eq!(session.context().server_name().unwrap(), "node.example.org");
    }

    #[test]
    fn test_unresolved_getter_is_precondition_error() {
        let ctx = ProvisioningContext::default();
        let err = ctx.app_dir().unwrap_err();
        assert_eq!(err.category(), workflow::ErrorCategory::Precondition);
        assert!(ctx.platform().is_err());
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config = DefaultsConfig {
            root_dir: Some("/srv/www".into()),
            db_password: Some("fixed".into()),
            ..Default::default()
        };
        let defaults = Defaults::for_host("h").with_config(&config);
        assert_eq!(defaults.root_dir, "/srv/www");
        assert_eq!(defaults.db_password, "fixed");
        assert_eq!(defaults.project_name, "myproject");
    }

    #[test]
    fn test_debug_redacts_password() {
        let host = host();
        let mut prompter = workflow::DefaultsPrompter;
        let mut session = Session::new(defaults(), ResolveMode::Defaults);
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Database, &mut env).unwrap();
        }
        let password = session.context().db_password().unwrap().to_string();
        let debug = format!("{:?}", session.context());
        assert!(!debug.contains(&password));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_normalize_dir() {
        assert_eq!(normalize_dir("/var/www/"), "/var/www");
        assert_eq!(normalize_dir("/"), "/");
        assert_eq!(normalize_dir(" /srv "), "/srv");
    }

    #[test]
    fn test_root_install_dir_gives_single_slash() {
        let host = FakeHost::new()
            .on("echo $HOME", "/\n")
            .on("id -un", "root\n");
        let mut prompter = Refuse;
        let mut session = Session::new(defaults(), ResolveMode::Defaults);
        session.preset_root_dir("/");
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Dirs, &mut env).unwrap();
        }
        let ctx = session.context();
        assert_eq!(ctx.root_dir().unwrap(), "/");
        assert_eq!(ctx.app_dir().unwrap(), "/nodeshot");
        assert_eq!(ctx.tmp_dir().unwrap(), "/nodeshot_install");
    }

    #[test]
    fn test_project_preset_keeps_default_root_dir() {
        let host = host();
        let mut prompter = Refuse;
        let mut session = Session::new(defaults(), ResolveMode::Interactive);
        session.preset_update_target(None, Some("community".to_string()));
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Dirs, &mut env).unwrap();
        }
        let ctx = session.context();
        assert_eq!(ctx.root_dir().unwrap(), "/var/www");
        assert_eq!(ctx.project_name().unwrap(), "community");
    }

    #[test]
    fn test_update_without_presets_still_prompts() {
        let host = host();
        let mut prompter = ScriptedPrompter::new(&[]);
        let mut session = Session::new(defaults(), ResolveMode::Interactive);
        session.preset_update_target(None, None);
        {
            let mut env = StepEnv::new(&host, &mut prompter);
            session.satisfy(Need::Dirs, &mut env).unwrap();
        }
        assert_eq!(prompter.asked, vec!["Set install directory", "Set project name"]);
    }
}
