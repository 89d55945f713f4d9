//! Step environment and provider traits
//!
//! These traits keep the workflow engine independent of how commands reach
//! the managed host, how the operator is asked for values, and how progress
//! is displayed.

use crate::error::{Error, Result};
use crate::types::{CommandOutput, RunOptions, StepOutcome};

/// Executes commands on the managed host
///
/// A non-zero exit is reported through [`CommandOutput::success`]; only
/// failing to reach the host or spawn the command is an `Err`.
pub trait CommandRunner {
    /// Run a shell command
    fn run(&self, command: &str, opts: RunOptions) -> Result<CommandOutput>;

    /// Run a shell command, feeding `input` to its stdin
    fn run_with_input(&self, command: &str, input: &str, opts: RunOptions)
    -> Result<CommandOutput>;

    /// Whether the acting identity is already the privileged account
    fn is_privileged(&self) -> Result<bool>;

    /// Run a command and require it to succeed
    fn run_checked(&self, command: &str, opts: RunOptions) -> Result<CommandOutput> {
        let output = self.run(command, opts)?;
        if !output.success {
            return Err(Error::from_command_output(command, &output));
        }
        Ok(output)
    }

    /// Run a command and capture trimmed stdout
    fn run_capture(&self, command: &str, opts: RunOptions) -> Result<String> {
        let output = self.run_checked(command, opts)?;
        Ok(output.stdout_str().trim().to_string())
    }

    /// Run a command and return just success/failure
    fn run_status(&self, command: &str, opts: RunOptions) -> Result<bool> {
        Ok(self.run(command, RunOptions { quiet: true, ..opts })?.success)
    }

    /// Check whether a path exists on the managed host
    fn path_exists(&self, path: &str) -> Result<bool> {
        self.run_status(&format!("test -e {path}"), RunOptions::quiet())
    }

    /// Read a file, `None` when it does not exist
    fn read_file(&self, path: &str, elevate: bool) -> Result<Option<String>> {
        let opts = RunOptions::quiet().with_elevate(elevate);
        if !self.run_status(&format!("test -f {path}"), opts)? {
            return Ok(None);
        }
        let command = format!("cat {path}");
        let output = self.run(&command, opts)?;
        if !output.success {
            return Err(Error::from_command_output(&command, &output));
        }
        Ok(Some(output.stdout_str()))
    }

    /// Replace a file's content
    fn write_file(&self, path: &str, content: &str, elevate: bool) -> Result<()> {
        let command = format!("tee {path} > /dev/null");
        let output =
            self.run_with_input(&command, content, RunOptions::quiet().with_elevate(elevate))?;
        if !output.success {
            return Err(Error::from_command_output(&command, &output));
        }
        Ok(())
    }

    /// Append text to a file, creating it when missing
    fn append_file(&self, path: &str, text: &str, elevate: bool) -> Result<()> {
        let command = format!("tee -a {path} > /dev/null");
        let output =
            self.run_with_input(&command, text, RunOptions::quiet().with_elevate(elevate))?;
        if !output.success {
            return Err(Error::from_command_output(&command, &output));
        }
        Ok(())
    }
}

/// Asks the operator for a value
pub trait Prompter {
    /// Ask with `default` as the suggested answer
    fn prompt(&mut self, message: &str, default: &str) -> Result<String>;
}

/// Prompter that always takes the default without asking
pub struct DefaultsPrompter;

impl Prompter for DefaultsPrompter {
    fn prompt(&mut self, _message: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}

/// Progress callback for workflow execution
pub trait ProgressCallback {
    /// Called before the first step runs
    fn on_workflow_start(&mut self, name: &str, steps: usize);

    /// Called when a step starts
    fn on_step_start(&mut self, index: usize, id: &str, description: &str);

    /// Called when a step finishes without a fatal error
    fn on_step_complete(&mut self, id: &str, outcome: &StepOutcome);

    /// Called when a step fails fatally
    fn on_step_failed(&mut self, id: &str, error: &Error);

    /// Called after the last step
    fn on_workflow_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_workflow_start(&mut self, _name: &str, _steps: usize) {}
    fn on_step_start(&mut self, _index: usize, _id: &str, _description: &str) {}
    fn on_step_complete(&mut self, _id: &str, _outcome: &StepOutcome) {}
    fn on_step_failed(&mut self, _id: &str, _error: &Error) {}
    fn on_workflow_complete(&mut self) {}
}

/// Everything a step (or precondition resolution) may use
pub struct StepEnv<'a> {
    /// Runs commands on the managed host
    pub runner: &'a dyn CommandRunner,
    /// Asks the operator for values
    pub prompter: &'a mut dyn Prompter,
}

impl<'a> StepEnv<'a> {
    /// Create a new step environment
    pub fn new(runner: &'a dyn CommandRunner, prompter: &'a mut dyn Prompter) -> Self {
        Self { runner, prompter }
    }
}
