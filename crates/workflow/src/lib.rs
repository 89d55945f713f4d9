//! # Workflow
//!
//! An engine for idempotent provisioning of a single managed host.
//!
//! ## Core Concepts
//!
//! - **Step**: one named, re-runnable unit of work with declared requirements
//! - **StepState**: the resolved configuration steps read; requirements are
//!   resolved lazily and exactly once, just before the first step needing them
//! - **Workflow**: an ordered list of steps, executed strictly in sequence
//! - **Renderer**: literal placeholder substitution plus marker-delimited
//!   blocks, so generated config files can be rewritten safely
//! - **Poller**: waits for supervised processes to converge to running
//!
//! ## Example
//!
//! ```ignore
//! use workflow::{execute, Checkpoint, NoProgress, StepEnv, Workflow};
//!
//! let workflow = Workflow::new("update")
//!     .then(Checkpoint::new("resolve-config", "Resolve configuration", vec![Need::Dirs]))
//!     .then(VerifyInstallation)
//!     .then(RestartServices);
//!
//! let mut env = StepEnv::new(&runner, &mut prompter);
//! let summary = execute(&workflow, &mut session, &mut env, &mut NoProgress)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`CommandRunner`]: runs commands on the managed host, with elevation
//! - [`Prompter`]: asks the operator for configuration values
//! - [`ProgressCallback`]: receives step progress
//! - [`StatusReader`]: reports supervised process states to the poller

pub mod context;
pub mod error;
pub mod executor;
pub mod poll;
pub mod render;
pub mod step;
pub mod types;
pub mod workflow;

// Re-export main types at crate root
pub use context::{CommandRunner, DefaultsPrompter, NoProgress, ProgressCallback, Prompter, StepEnv};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{WorkflowError, execute};
pub use poll::{
    NoCallback, PollCallback, PollConfig, PollReport, ServiceStatus, StatusReader, await_healthy,
};
pub use render::{BlockEdit, ManagedFile, render, unresolved_placeholders, upsert_block};
pub use step::{BoxedStep, Checkpoint, Step, StepState};
pub use types::{CommandOutput, RunOptions, RunSummary, StepOutcome, StepRecord};
pub use workflow::{StepInfo, Workflow};
