//! Execution engine - runs a workflow's steps strictly in order

use crate::context::{ProgressCallback, StepEnv};
use crate::error::Error;
use crate::step::{Step, StepState};
use crate::types::{RunSummary, StepOutcome};
use crate::workflow::Workflow;

/// A fatal failure that aborted a workflow
#[derive(Debug, thiserror::Error)]
#[error("step {} ({step}) failed: {source}", .index + 1)]
pub struct WorkflowError {
    /// Id of the step that failed
    pub step: &'static str,
    /// Zero-based position of the step
    pub index: usize,
    /// What went wrong
    #[source]
    pub source: Error,
    /// Steps that completed before the failure (no rollback is attempted)
    pub completed: RunSummary,
}

/// Execute a workflow
///
/// For each step: resolve every requirement that is not yet satisfied,
/// run the body, record the outcome. Ignorable errors (the change was
/// already in place) are recorded as skipped; the first fatal error stops
/// the run and is returned with the failing step. Steps already applied
/// are left as they are.
pub fn execute<S, P>(
    workflow: &Workflow<S>,
    state: &mut S,
    env: &mut StepEnv<'_>,
    progress: &mut P,
) -> Result<RunSummary, WorkflowError>
where
    S: StepState,
    P: ProgressCallback,
{
    let mut summary = RunSummary::default();
    progress.on_workflow_start(workflow.name(), workflow.len());

    for (index, step) in workflow.steps().iter().enumerate() {
        progress.on_step_start(index, step.id(), &step.description());

        match run_step(step.as_ref(), state, env) {
            Ok(outcome) => {
                progress.on_step_complete(step.id(), &outcome);
                summary.record(step.id(), outcome);
            }
            Err(e) if e.is_ignorable() => {
                log::info!("{}: {e}, continuing", step.id());
                let outcome = StepOutcome::Skipped {
                    reason: e.to_string(),
                };
                progress.on_step_complete(step.id(), &outcome);
                summary.record(step.id(), outcome);
            }
            Err(e) => {
                log::error!("{} aborted the {} workflow: {e}", step.id(), workflow.name());
                progress.on_step_failed(step.id(), &e);
                return Err(WorkflowError {
                    step: step.id(),
                    index,
                    source: e,
                    completed: summary,
                });
            }
        }
    }

    progress.on_workflow_complete();
    Ok(summary)
}

/// Check preconditions, then run the body
fn run_step<S: StepState>(
    step: &dyn Step<S>,
    state: &mut S,
    env: &mut StepEnv<'_>,
) -> crate::error::Result<StepOutcome> {
    for requirement in step.requires() {
        if !state.is_satisfied(requirement) {
            log::debug!("{}: resolving {requirement:?}", step.id());
            state.satisfy(requirement, env)?;
        }
    }
    step.run(state, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CommandRunner, DefaultsPrompter, NoProgress};
    use crate::error::Result;
    use crate::types::{CommandOutput, RunOptions};
    use std::cell::RefCell;

    struct NullRunner;

    impl CommandRunner for NullRunner {
        fn run(&self, _command: &str, _opts: RunOptions) -> Result<CommandOutput> {
            Ok(CommandOutput::ok(""))
        }

        fn run_with_input(
            &self,
            _command: &str,
            _input: &str,
            _opts: RunOptions,
        ) -> Result<CommandOutput> {
            Ok(CommandOutput::ok(""))
        }

        fn is_privileged(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Need {
        Config,
    }

    #[derive(Default)]
    struct TestState {
        config: Option<String>,
        resolutions: usize,
        log: RefCell<Vec<&'static str>>,
    }

    impl StepState for TestState {
        type Requirement = Need;

        fn is_satisfied(&self, requirement: Need) -> bool {
            match requirement {
                Need::Config => self.config.is_some(),
            }
        }

        fn satisfy(&mut self, requirement: Need, env: &mut StepEnv<'_>) -> Result<()> {
            match requirement {
                Need::Config => {
                    self.resolutions += 1;
                    self.config = Some(env.prompter.prompt("Config: ", "default")?);
                }
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    enum Behavior {
        Change,
        AlreadyApplied,
        Fail,
    }

    #[derive(Debug)]
    struct TestStep {
        id: &'static str,
        needs_config: bool,
        behavior: Behavior,
    }

    impl TestStep {
        fn new(id: &'static str, behavior: Behavior) -> Self {
            Self {
                id,
                needs_config: false,
                behavior,
            }
        }

        fn needing_config(mut self) -> Self {
            self.needs_config = true;
            self
        }
    }

    impl Step<TestState> for TestStep {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> String {
            format!("Test step {}", self.id)
        }

        fn requires(&self) -> Vec<Need> {
            if self.needs_config {
                vec![Need::Config]
            } else {
                Vec::new()
            }
        }

        fn run(&self, state: &TestState, _env: &mut StepEnv<'_>) -> Result<StepOutcome> {
            state.log.borrow_mut().push(self.id);
            if self.needs_config {
                assert!(state.config.is_some(), "precondition not resolved");
            }
            match self.behavior {
                Behavior::Change => Ok(StepOutcome::Changed),
                Behavior::AlreadyApplied => Err(Error::AlreadyApplied {
                    command: "apt-get install -y redis-server".into(),
                }),
                Behavior::Fail => Err(Error::MissingTarget {
                    path: "/var/www/nodeshot".into(),
                }),
            }
        }
    }

    fn run(workflow: &Workflow<TestState>, state: &mut TestState) -> std::result::Result<RunSummary, WorkflowError> {
        let runner = NullRunner;
        let mut prompter = DefaultsPrompter;
        let mut env = StepEnv::new(&runner, &mut prompter);
        execute(workflow, state, &mut env, &mut NoProgress)
    }

    #[test]
    fn test_execute_empty_workflow() {
        let workflow = Workflow::new("empty");
        let mut state = TestState::default();
        let summary = run(&workflow, &mut state).unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_execute_runs_steps_in_order() {
        let workflow = Workflow::new("install")
            .then(TestStep::new("a", Behavior::Change))
            .then(TestStep::new("b", Behavior::Change))
            .then(TestStep::new("c", Behavior::Change));
        let mut state = TestState::default();

        let summary = run(&workflow, &mut state).unwrap();

        assert_eq!(summary.changed, 3);
        assert_eq!(*state.log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_preconditions_resolved_once() {
        let workflow = Workflow::new("install")
            .then(TestStep::new("a", Behavior::Change).needing_config())
            .then(TestStep::new("b", Behavior::Change).needing_config());
        let mut state = TestState::default();

        run(&workflow, &mut state).unwrap();

        assert_eq!(state.resolutions, 1);
        assert_eq!(state.config.as_deref(), Some("default"));
    }

    #[test]
    fn test_ignorable_error_continues() {
        let workflow = Workflow::new("install")
            .then(TestStep::new("a", Behavior::AlreadyApplied))
            .then(TestStep::new("b", Behavior::Change));
        let mut state = TestState::default();

        let summary = run(&workflow, &mut state).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(*state.log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_fatal_error_aborts() {
        let workflow = Workflow::new("update")
            .then(TestStep::new("a", Behavior::Change))
            .then(TestStep::new("verify", Behavior::Fail))
            .then(TestStep::new("never", Behavior::Change));
        let mut state = TestState::default();

        let err = run(&workflow, &mut state).unwrap_err();

        assert_eq!(err.step, "verify");
        assert_eq!(err.index, 1);
        assert_eq!(err.completed.step_ids(), vec!["a"]);
        assert!(err.source.is_fatal());
        assert_eq!(*state.log.borrow(), vec!["a", "verify"]);
        assert!(err.to_string().contains("step 2 (verify) failed"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), err.source.to_string());
    }
}
