//! Bundled templates and the placeholder tokens they use

/// Public server name
pub const SERVER_NAME: &str = "<server_name>";
/// Application directory (`<root>/nodeshot`)
pub const APP_DIR: &str = "<app_dir>";
/// Django project name
pub const PROJECT_NAME: &str = "<project_name>";
/// Virtualenv python home
pub const PYTHON_HOME: &str = "<python_home>";
pub const DB_USER: &str = "<db_user>";
pub const DB_PASSWORD: &str = "<db_password>";

pub const NGINX_SITE: &str = include_str!("../templates/nginx.conf");
pub const UWSGI_INI: &str = include_str!("../templates/uwsgi.ini");
pub const UWSGI_PROGRAM: &str = include_str!("../templates/uwsgi.conf");
pub const CELERY_PROGRAM: &str = include_str!("../templates/celery.conf");
pub const CELERY_BEAT_PROGRAM: &str = include_str!("../templates/celery-beat.conf");
pub const POSTFIX_MAIN: &str = include_str!("../templates/postfix.cf");
pub const DATABASE_ROLE_SQL: &str = include_str!("../templates/db-role.sql");
pub const DATABASE_CREATE_SQL: &str = include_str!("../templates/db-create.sql");
/// Extensions and grants, safe to apply on every run
pub const DATABASE_SQL: &str = include_str!("../templates/db.sql");
const DEPENDENCIES: &str = include_str!("../templates/dependencies.txt");

/// System packages to install, before platform substitutions
pub fn dependencies() -> Vec<&'static str> {
    DEPENDENCIES
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
