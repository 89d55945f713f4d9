//! Command runner for the local machine
//!
//! Every command goes through `sh -c`, so steps can use pipes, redirects
//! and `&&` chains exactly as they would over ssh.

use std::cell::RefCell;
use std::io::Write;
use std::process::{Command, Stdio};

use workflow::{CommandOutput, CommandRunner, RunOptions};

use crate::sudo::{self, Elevation, SudoTicket};

/// Log a finished command's output
///
/// Output the operator asked to see goes to `info!`, quiet output only to
/// `trace!`. Failures always log stderr at `trace!`.
pub fn report(command: &str, output: &CommandOutput, opts: RunOptions) {
    let stdout = output.stdout_str();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        if opts.quiet {
            log::trace!("  {line}");
        } else {
            log::info!("  {line}");
        }
    }
    if !output.success {
        log::trace!("{command} failed: {}", output.stderr_str().trim());
    }
}

/// Runs commands on this machine
#[derive(Default)]
pub struct LocalRunner {
    elevation: Elevation,
    ticket: RefCell<Option<SudoTicket>>,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn detect_privilege(&self) -> workflow::Result<bool> {
        let output = self.spawn(sudo::IDENTITY_COMMAND, None)?;
        Ok(output.success && sudo::is_root_uid(&output.stdout_str()))
    }

    /// Make sure `sudo -n` will not fail for lack of a cached credential
    fn ensure_ticket(&self) -> workflow::Result<()> {
        let mut ticket = self.ticket.borrow_mut();
        if ticket.is_none() {
            let acquired = SudoTicket::acquire("provisioning needs root on this machine")
                .map_err(|e| workflow::Error::Other(format!("{e:#}")))?;
            *ticket = Some(acquired);
        }
        Ok(())
    }

    fn prepare(&self, command: &str, opts: RunOptions) -> workflow::Result<String> {
        let prepared = self
            .elevation
            .prepare(command, opts.elevate, || self.detect_privilege())?;
        if prepared != command {
            self.ensure_ticket()?;
        }
        Ok(prepared)
    }

    fn spawn(&self, command: &str, input: Option<&str>) -> workflow::Result<CommandOutput> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
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

        Ok(child.wait_with_output()?.into())
    }
}

impl CommandRunner for LocalRunner {
    fn run(&self, command: &str, opts: RunOptions) -> workflow::Result<CommandOutput> {
        let prepared = self.prepare(command, opts)?;
        log::debug!("local: {prepared}");
        let output = self.spawn(&prepared, None)?;
        report(&prepared, &output, opts);
        Ok(output)
    }

    fn run_with_input(
        &self,
        command: &str,
        input: &str,
        opts: RunOptions,
    ) -> workflow::Result<CommandOutput> {
        let prepared = self.prepare(command, opts)?;
        log::debug!("local (stdin {} bytes): {prepared}", input.len());
        let output = self.spawn(&prepared, Some(input))?;
        report(&prepared, &output, opts);
        Ok(output)
    }

    fn is_privileged(&self) -> workflow::Result<bool> {
        self.elevation.is_privileged(|| self.detect_privilege())
    }
}
