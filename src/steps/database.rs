//! Database role and spatial database

use workflow::{Error, RunOptions, Step, StepEnv, StepOutcome, render};

use super::outcome;
use crate::resolver::{Need, Session};
use crate::templates;

/// Where the bootstrap SQL is staged while it runs
pub const SQL_PATH: &str = "/tmp/stackup-db.sql";

/// Name of the application database
pub const DATABASE: &str = "nodeshot";

/// Run `command` as the postgres superuser
fn as_postgres(command: &str) -> String {
    format!("su - postgres -c {}", shell_words::quote(command))
}

/// Quote `value` as a SQL string literal body
fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Create the database role and the PostGIS-enabled database
///
/// Role and database are created only when missing; extensions and grants
/// are applied on every run so a half-finished setup is completed later.
#[derive(Debug)]
pub struct CreateDatabase;

impl CreateDatabase {
    /// Whether `sql` returns a row when run against `database`
    fn query_hit(env: &StepEnv<'_>, database: &str, sql: &str) -> workflow::Result<bool> {
        let query = format!("psql -d {database} -tAc {}", shell_words::quote(sql));
        let output = env.runner.run(&as_postgres(&query), RunOptions::elevated())?;
        Ok(output.success && output.stdout_str().trim() == "1")
    }

    fn role_exists(env: &StepEnv<'_>, user: &str) -> workflow::Result<bool> {
        Self::query_hit(
            env,
            "postgres",
            &format!("SELECT 1 FROM pg_roles WHERE rolname='{}'", sql_literal(user)),
        )
    }

    fn database_exists(env: &StepEnv<'_>) -> workflow::Result<bool> {
        Self::query_hit(
            env,
            "postgres",
            &format!("SELECT 1 FROM pg_database WHERE datname='{DATABASE}'"),
        )
    }

    fn postgis_enabled(env: &StepEnv<'_>) -> workflow::Result<bool> {
        Self::query_hit(env, DATABASE, "SELECT 1 FROM pg_extension WHERE extname='postgis'")
    }
}

impl Step<Session> for CreateDatabase {
    fn id(&self) -> &'static str {
        "create-db"
    }

    fn description(&self) -> String {
        "Create the database and its role".into()
    }

    fn requires(&self) -> Vec<Need> {
        vec![Need::Dirs, Need::Database]
    }

    fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
        let ctx = session.context();
        let user = ctx.db_user()?;
        let password = sql_literal(ctx.db_password()?);
        let subs = [(templates::DB_USER, user), (templates::DB_PASSWORD, password.as_str())];

        let mut script = String::new();
        let mut changed = false;
        if Self::role_exists(env, user)? {
            log::debug!("database role {user} already exists");
        } else {
            script.push_str(&render(templates::DATABASE_ROLE_SQL, &subs)?);
            changed = true;
        }
        if Self::database_exists(env)? {
            changed |= !Self::postgis_enabled(env)?;
        } else {
            script.push_str(&render(templates::DATABASE_CREATE_SQL, &subs)?);
            changed = true;
        }
        script.push_str(&render(templates::DATABASE_SQL, &subs)?);

        env.runner.write_file(SQL_PATH, &script, ctx.use_sudo()?)?;
        env.runner
            .run_checked(&format!("chmod 644 {SQL_PATH}"), RunOptions::elevated())?;

        let command = as_postgres(&format!("psql -v ON_ERROR_STOP=1 -f {SQL_PATH}"));
        let result = env.runner.run(&command, RunOptions::elevated());

        // the file holds the password; remove it whatever happened
        env.runner
            .run(&format!("rm -f {SQL_PATH}"), RunOptions::elevated())?;

        let output = result?;
        if !output.success {
            return Err(Error::from_command_output(&command, &output));
        }
        Ok(outcome(changed))
    }
}
