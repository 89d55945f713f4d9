//! Privilege elevation on the managed host
//!
//! Elevation is decided per command and never for the whole process:
//! 1. A step asks for elevation through `RunOptions::elevate`
//! 2. The runner checks the acting identity once (`id -u`)
//! 3. Only a non-root identity gets its command wrapped in `sudo -n sh -c`

use anyhow::{Context, Result, bail};
use std::cell::OnceCell;
use std::process::Command;

/// Command that prints the acting identity's uid
pub const IDENTITY_COMMAND: &str = "id -u";

/// Wrap a shell command so it runs as root
pub fn wrap(command: &str) -> String {
    format!("sudo -n sh -c {}", shell_words::quote(command))
}

/// Interpret the output of [`IDENTITY_COMMAND`]
pub fn is_root_uid(output: &str) -> bool {
    output.trim() == "0"
}

/// Per-runner elevation decision, caching the identity check
#[derive(Debug, Default)]
pub struct Elevation {
    privileged: OnceCell<bool>,
}

impl Elevation {
    /// Elevation state with a known identity (no detection needed)
    #[cfg(test)]
    pub fn known(privileged: bool) -> Self {
        let elevation = Self::default();
        let _ = elevation.privileged.set(privileged);
        elevation
    }

    /// Whether the acting identity is root, detecting it on first use
    pub fn is_privileged<F>(&self, detect: F) -> workflow::Result<bool>
    where
        F: FnOnce() -> workflow::Result<bool>,
    {
        if let Some(privileged) = self.privileged.get() {
            return Ok(*privileged);
        }
        let privileged = detect()?;
        log::debug!(
            "acting identity is {}",
            if privileged { "root" } else { "unprivileged" }
        );
        let _ = self.privileged.set(privileged);
        Ok(privileged)
    }

    /// The command line to actually run
    pub fn prepare<F>(&self, command: &str, elevate: bool, detect: F) -> workflow::Result<String>
    where
        F: FnOnce() -> workflow::Result<bool>,
    {
        if elevate && !self.is_privileged(detect)? {
            Ok(wrap(command))
        } else {
            Ok(command.to_string())
        }
    }
}

/// Scoped local sudo credential - invalidated on drop
///
/// `sudo -n` never prompts, so a local operator validates once up front
/// with `sudo -v` and every later elevated command reuses the timestamp.
pub struct SudoTicket {
    validated: bool,
}

impl SudoTicket {
    /// Acquire sudo privileges with a reason shown to the operator
    pub fn acquire(reason: &str) -> Result<Self> {
        eprintln!();
        eprintln!("  Sudo required: {reason}");
        eprintln!();

        let status = Command::new("sudo")
            .arg("-v")
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        Ok(Self { validated: true })
    }
}

impl Drop for SudoTicket {
    fn drop(&mut self) {
        if self.validated {
            let _ = Command::new("sudo").arg("-k").status();
        }
    }
}
