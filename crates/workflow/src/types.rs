//! Core types for provisioning workflows

use std::process::Output;

/// How a command should be executed on the managed host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Needs privilege; the runner adds sudo unless already root
    pub elevate: bool,
    /// Don't echo the command's output to the operator
    pub quiet: bool,
}

impl RunOptions {
    /// Unprivileged, output shown
    pub fn plain() -> Self {
        Self::default()
    }

    /// Privileged, output hidden
    pub fn elevated() -> Self {
        Self {
            elevate: true,
            quiet: true,
        }
    }

    /// Unprivileged, output hidden
    pub fn quiet() -> Self {
        Self {
            elevate: false,
            quiet: true,
        }
    }

    pub fn with_elevate(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }
}

/// Output from a command on the managed host
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().into_bytes(),
            stderr: Vec::new(),
            success: true,
        }
    }

    /// Failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into().into_bytes(),
            success: false,
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Result of running a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step changed the managed host
    Changed,
    /// Everything was already in place
    NoChange,
    /// The step did not apply (already done, nothing to do)
    Skipped { reason: String },
}

impl StepOutcome {
    /// Check if the outcome represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// One executed step
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub id: String,
    pub outcome: StepOutcome,
}

/// Summary of a workflow run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub steps: Vec<StepRecord>,
}

impl RunSummary {
    /// Record the outcome of a step
    pub fn record(&mut self, id: &str, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Changed => self.changed += 1,
            StepOutcome::NoChange => self.unchanged += 1,
            StepOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.steps.push(StepRecord {
            id: id.to_string(),
            outcome,
        });
    }

    /// Total number of steps that ran
    pub fn total(&self) -> usize {
        self.changed + self.unchanged + self.skipped
    }

    /// Ids of the steps in execution order
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}
