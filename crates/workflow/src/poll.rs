//! Service health polling
//!
//! After services are restarted, poll their supervisor until every tracked
//! process reports running. A process that reports anything other than
//! running or starting aborts immediately. Polling is bounded by
//! [`PollConfig::max_attempts`] unless explicitly configured as unbounded.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::thread;
use std::time::Duration;

/// Reported state of one supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Starting,
    Running,
    /// Any other reported state, with the keyword as reported
    Failed(String),
    /// The supervisor did not report the process at all
    Unknown,
}

impl ServiceStatus {
    /// Classify a supervisor state keyword (exact match)
    pub fn classify(keyword: &str) -> Self {
        match keyword {
            "RUNNING" => Self::Running,
            "STARTING" => Self::Starting,
            other => Self::Failed(other.to_string()),
        }
    }

    /// Whether polling must stop with an error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Unknown)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "STARTING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Failed(keyword) => write!(f, "{keyword}"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Source of process states
pub trait StatusReader {
    /// Query the current state of one process
    fn read_status(&mut self, process: &str) -> Result<ServiceStatus>;
}

/// Polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between polling passes
    pub interval: Duration,
    /// Maximum number of passes; `None` polls until success or failure
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: Some(120),
        }
    }
}

impl PollConfig {
    /// Create a new bounded poll config.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Poll until every process runs or one fails, however long that takes.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }
}

/// Callback for polling progress.
pub trait PollCallback {
    /// Called after a pass in which some processes were still starting.
    fn on_waiting(&self, attempt: u32, pending: &[String]);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_waiting(&self, _attempt: u32, _pending: &[String]) {}
}

/// Outcome of a successful poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Number of passes it took for every process to run
    pub attempts: u32,
}

/// Wait until every named process is running
///
/// Each pass checks every process in name order. The first fatal status
/// aborts with [`Error::ServiceFailed`]. The call succeeds only when all
/// processes reported running in the same pass. Exhausting
/// `max_attempts` yields [`Error::PollTimedOut`].
pub fn await_healthy<P>(
    processes: &BTreeSet<String>,
    reader: &mut P,
    config: &PollConfig,
    callback: Option<&dyn PollCallback>,
) -> Result<PollReport>
where
    P: StatusReader + ?Sized,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let mut pending = Vec::new();

        for process in processes {
            let status = reader.read_status(process)?;
            log::debug!("{process}: {status}");
            if status.is_fatal() {
                return Err(Error::ServiceFailed {
                    process: process.clone(),
                    status: status.to_string(),
                });
            }
            if status != ServiceStatus::Running {
                pending.push(process.clone());
            }
        }

        if pending.is_empty() {
            return Ok(PollReport { attempts: attempt });
        }

        if config.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(Error::PollTimedOut {
                attempts: attempt,
                pending,
            });
        }

        if let Some(cb) = callback {
            cb.on_waiting(attempt, &pending);
        }

        thread::sleep(config.interval);
    }
}
