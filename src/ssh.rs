//! Command runner for a remote host over ssh
//!
//! Uses the system `ssh` client, so keys, agents and `~/.ssh/config`
//! behave exactly as they do for the operator. The remote command is
//! passed as one quoted `sh -c` argument.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::str::FromStr;

use workflow::{CommandOutput, CommandRunner, RunOptions};

use crate::runner;
use crate::sudo::{self, Elevation};

/// A managed host address: `[user@]host[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl HostSpec {
    /// Whether commands can run on this machine without ssh
    pub fn is_local(&self) -> bool {
        self.user.is_none()
            && self.port.is_none()
            && matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// The `user@host` argument for ssh
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

impl Default for HostSpec {
    fn default() -> Self {
        Self {
            user: None,
            host: "localhost".to_string(),
            port: None,
        }
    }
}

impl FromStr for HostSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty host".to_string());
        }

        let (user, rest) = match s.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(format!("Missing user before '@' in '{s}'")),
            None => (None, s),
        };

        let parse_port = |port: &str| {
            port.parse::<u16>()
                .map_err(|_| format!("Invalid port '{port}' in '{s}'"))
        };

        // `[v6]:port`, bare `v6`, or `name:port`
        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| format!("Missing ']' in '{s}'"))?;
            match tail {
                "" => (host, None),
                _ => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(parse_port(port)?)),
                    None => return Err(format!("Unexpected '{tail}' after ']' in '{s}'")),
                },
            }
        } else if rest.matches(':').count() > 1 {
            (rest, None)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, Some(parse_port(port)?)),
                None => (rest, None),
            }
        };

        if host.is_empty() {
            return Err(format!("Missing host name in '{s}'"));
        }

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(port) = self.port else {
            return write!(f, "{}", self.destination());
        };
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]:{port}", self.host)
        } else {
            write!(f, "{}:{port}", self.host)
        }
    }
}

/// Runs commands on a remote host through the `ssh` client
///
/// Elevation uses `sudo -n`, so a non-root remote user needs passwordless
/// sudo for the provisioning commands.
pub struct SshRunner {
    target: HostSpec,
    identity: Option<PathBuf>,
    elevation: Elevation,
}

impl SshRunner {
    pub fn new(target: HostSpec, identity: Option<PathBuf>) -> Self {
        Self {
            target,
            identity,
            elevation: Elevation::default(),
        }
    }

    /// Arguments passed to `ssh` for one remote command
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "LogLevel=ERROR".to_string()];
        if let Some(port) = self.target.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(self.target.destination());
        args.push("--".to_string());
        args.push(format!("sh -c {}", shell_words::quote(command)));
        args
    }

    fn detect_privilege(&self) -> workflow::Result<bool> {
        let output = self.spawn(sudo::IDENTITY_COMMAND, None)?;
        Ok(output.success && sudo::is_root_uid(&output.stdout_str()))
    }

    fn spawn(&self, command: &str, input: Option<&str>) -> workflow::Result<CommandOutput> {
        let mut child = Command::new("ssh")
            .args(self.ssh_args(command))
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(input) = input
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        transport_checked(&self.target, output)
    }
}

/// Exit status ssh uses for its own failures
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Turn ssh's own failures into errors, keeping remote exit codes as output
///
/// Connection, authentication and host key problems exit 255; every other
/// status belongs to the remote command.
fn transport_checked(target: &HostSpec, output: Output) -> workflow::Result<CommandOutput> {
    if output.status.code() == Some(SSH_TRANSPORT_FAILURE) {
        return Err(workflow::Error::Other(format!(
            "ssh to {target} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.into())
}

impl CommandRunner for SshRunner {
    fn run(&self, command: &str, opts: RunOptions) -> workflow::Result<CommandOutput> {
        let prepared = self
            .elevation
            .prepare(command, opts.elevate, || self.detect_privilege())?;
        log::debug!("{}: {prepared}", self.target);
        let output = self.spawn(&prepared, None)?;
        runner::report(&prepared, &output, opts);
        Ok(output)
    }

    fn run_with_input(
        &self,
        command: &str,
        input: &str,
        opts: RunOptions,
    ) -> workflow::Result<CommandOutput> {
        let prepared = self
            .elevation
            .prepare(command, opts.elevate, || self.detect_privilege())?;
        log::debug!("{} (stdin {} bytes): {prepared}", self.target, input.len());
        let output = self.spawn(&prepared, Some(input))?;
        runner::report(&prepared, &output, opts);
        Ok(output)
    }

    fn is_privileged(&self) -> workflow::Result<bool> {
        self.elevation.is_privileged(|| self.detect_privilege())
    }
}
