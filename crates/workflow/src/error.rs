//! Error types for workflow operations.
//!
//! Errors are categorized so the executor can tell a fatal failure (abort
//! the whole run) from an ignorable one (the change was already applied on
//! a previous run).

use crate::types::CommandOutput;
use std::fmt;
use thiserror::Error;

/// Categories of workflow errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The managed host runs an OS/version we have no package rules for
    UnsupportedPlatform,
    /// An update was requested against a host without a prior install
    MissingTarget,
    /// A command exited non-zero
    Command,
    /// The command failed because its change is already in place
    AlreadyApplied,
    /// A supervised process did not reach a running state
    Convergence,
    /// A template could not be rendered
    Template,
    /// A step ran without its resolved configuration
    Precondition,
    /// Local IO or process spawning failed
    Io,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether an error of this category must abort the whole workflow.
    pub fn is_fatal(&self) -> bool {
        !self.is_ignorable()
    }

    /// Whether this error can be safely ignored (operation already done).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyApplied)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform => "Unsupported platform",
            Self::MissingTarget => "Installation not found",
            Self::Command => "Command failed",
            Self::AlreadyApplied => "Already applied",
            Self::Convergence => "Service failed to start",
            Self::Template => "Template error",
            Self::Precondition => "Configuration not resolved",
            Self::Io => "IO error",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform => "Provision a supported Ubuntu or Debian release",
            Self::MissingTarget => "Run install first, or point update at the right root directory",
            Self::Command => "Fix the underlying cause and re-run; completed steps are safe to repeat",
            Self::AlreadyApplied => "No action needed",
            Self::Convergence => "Inspect the process logs with supervisorctl tail <name>",
            Self::Template => "Check the placeholder names used by the template",
            Self::Precondition => "Resolve configuration before running this step",
            Self::Io => "Check that ssh and sh are available locally",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while running a workflow.
#[derive(Debug, Error)]
pub enum Error {
    /// The version banner matched none of the supported platforms
    #[error("unsupported platform: {banner}")]
    UnsupportedPlatform {
        /// First line of the banner reported by the host
        banner: String,
    },

    /// The installation an update targets does not exist
    #[error("no installation found at {path}")]
    MissingTarget {
        /// Directory that was expected to exist
        path: String,
    },

    /// A command exited non-zero
    #[error("command failed: {command}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Standard error (or standard output when stderr was empty)
        stderr: String,
    },

    /// A command failed only because its effect is already present
    #[error("already applied: {command}")]
    AlreadyApplied {
        /// Command line that reported the existing state
        command: String,
    },

    /// A supervised process reported a status other than running/starting
    #[error("process {process} failed to start (status: {status})")]
    ServiceFailed {
        /// Process name
        process: String,
        /// Status text reported by the supervisor
        status: String,
    },

    /// Polling gave up before every process was running
    #[error("services not running after {attempts} polls: {}", pending.join(", "))]
    PollTimedOut {
        /// Number of polling passes performed
        attempts: u32,
        /// Processes that were still not running
        pending: Vec<String>,
    },

    /// Substitution keys overlap, so substitution order would matter
    #[error("placeholder {first:?} overlaps with {second:?}")]
    OverlappingPlaceholders {
        /// First placeholder
        first: String,
        /// Placeholder containing or contained in the first
        second: String,
    },

    /// Empty placeholder key
    #[error("empty placeholder key")]
    EmptyPlaceholder,

    /// A managed block has a BEGIN marker but no END marker
    #[error("block {marker:?} is not terminated; fix or remove its BEGIN line")]
    UnterminatedBlock {
        /// Marker of the broken block
        marker: String,
    },

    /// A context value was read before it was resolved
    #[error("{0} has not been resolved")]
    Unresolved(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedPlatform { .. } => ErrorCategory::UnsupportedPlatform,
            Error::MissingTarget { .. } => ErrorCategory::MissingTarget,
            Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::AlreadyApplied { .. } => ErrorCategory::AlreadyApplied,
            Error::ServiceFailed { .. } | Error::PollTimedOut { .. } => ErrorCategory::Convergence,
            Error::OverlappingPlaceholders { .. }
            | Error::EmptyPlaceholder
            | Error::UnterminatedBlock { .. } => ErrorCategory::Template,
            Error::Unresolved(_) => ErrorCategory::Precondition,
            Error::Io(_) => ErrorCategory::Io,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error must abort the workflow.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Create an error from a failed command's output.
    ///
    /// Output that says the change is already in place becomes
    /// [`Error::AlreadyApplied`]; everything else is [`Error::CommandFailed`].
    pub fn from_command_output(command: &str, output: &CommandOutput) -> Self {
        let stderr = output.stderr_str();
        let text = if stderr.trim().is_empty() {
            output.stdout_str()
        } else {
            stderr
        };
        let lower = text.to_lowercase();

        if lower.contains("already exists")
            || lower.contains("already installed")
            || lower.contains("is already the newest version")
        {
            return Error::AlreadyApplied {
                command: command.to_string(),
            };
        }

        Error::CommandFailed {
            command: command.to_string(),
            stderr: text.trim().to_string(),
        }
    }
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;
