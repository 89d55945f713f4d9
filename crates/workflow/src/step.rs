//! Step trait for idempotent provisioning work
//!
//! A Step is one named unit of a workflow. It declares which resolved
//! state it needs, and its body must be safe to run again on a host where
//! it already ran ("create directory if absent", not "create or fail").

use crate::context::StepEnv;
use crate::error::Result;
use crate::types::StepOutcome;
use std::fmt;

/// State that steps read and that preconditions resolve into
///
/// The executor is the only caller of [`StepState::satisfy`]; step bodies
/// get a shared reference and cannot mutate it.
pub trait StepState {
    /// Tag naming one group of values a step may require
    type Requirement: Copy + Eq + fmt::Debug;

    /// Whether the requirement is already resolved
    fn is_satisfied(&self, requirement: Self::Requirement) -> bool;

    /// Resolve the requirement; must leave already-resolved values alone
    fn satisfy(&mut self, requirement: Self::Requirement, env: &mut StepEnv<'_>) -> Result<()>;
}

/// Core trait for workflow steps
///
/// # Example
///
/// ```ignore
/// use workflow::{Step, StepEnv, StepOutcome, RunOptions};
///
/// #[derive(Debug)]
/// struct WorkingDir;
///
/// impl Step<Session> for WorkingDir {
///     fn id(&self) -> &'static str {
///         "working-dir"
///     }
///
///     fn description(&self) -> String {
///         "Create the temporary working directory".into()
///     }
///
///     fn requires(&self) -> Vec<Need> {
///         vec![Need::Dirs]
///     }
///
///     fn run(&self, session: &Session, env: &mut StepEnv<'_>) -> workflow::Result<StepOutcome> {
///         let dir = session.context().tmp_dir()?;
///         env.runner.run_checked(&format!("mkdir -p {dir}"), RunOptions::quiet())?;
///         Ok(StepOutcome::Changed)
///     }
/// }
/// ```
pub trait Step<S: StepState>: fmt::Debug {
    /// Stable identifier, used in listings and error reports
    fn id(&self) -> &'static str;

    /// Human-readable description of what this step does
    fn description(&self) -> String;

    /// Requirements resolved before the body runs
    fn requires(&self) -> Vec<S::Requirement> {
        Vec::new()
    }

    /// Perform the step
    ///
    /// Should check the managed host first and return
    /// [`StepOutcome::NoChange`] when there is nothing to do.
    fn run(&self, state: &S, env: &mut StepEnv<'_>) -> Result<StepOutcome>;
}

/// A boxed step for type-erased storage
pub type BoxedStep<S> = Box<dyn Step<S>>;

/// A step with no body: exists to resolve requirements at a fixed point
/// in the workflow (e.g. "detect platform", "resolve configuration")
pub struct Checkpoint<R> {
    id: &'static str,
    description: &'static str,
    requires: Vec<R>,
}

impl<R> Checkpoint<R> {
    pub fn new(id: &'static str, description: &'static str, requires: Vec<R>) -> Self {
        Self {
            id,
            description,
            requires,
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Checkpoint<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("id", &self.id)
            .field("requires", &self.requires)
            .finish()
    }
}

impl<S: StepState> Step<S> for Checkpoint<S::Requirement> {
    fn id(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> String {
        self.description.to_string()
    }

    fn requires(&self) -> Vec<S::Requirement> {
        self.requires.clone()
    }

    fn run(&self, _state: &S, _env: &mut StepEnv<'_>) -> Result<StepOutcome> {
        Ok(StepOutcome::NoChange)
    }
}
