//! Ordered workflows of steps

use crate::step::{BoxedStep, Step, StepState};

/// An ordered sequence of steps, run front to back
pub struct Workflow<S: StepState> {
    name: &'static str,
    steps: Vec<BoxedStep<S>>,
}

/// Listing entry for a step, used by `steps` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub id: &'static str,
    pub description: String,
    pub requires: Vec<String>,
}

impl<S: StepState> Workflow<S> {
    /// Create a new empty workflow
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn then(mut self, step: impl Step<S> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Workflow name (e.g. "install")
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[BoxedStep<S>] {
        &self.steps
    }

    /// Ids of the steps in execution order
    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    /// Position of a step by id
    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == id)
    }

    /// Describe every step for display
    pub fn describe(&self) -> Vec<StepInfo> {
        self.steps
            .iter()
            .map(|s| StepInfo {
                id: s.id(),
                description: s.description(),
                requires: s.requires().iter().map(|r| format!("{r:?}")).collect(),
            })
            .collect()
    }

    /// Total number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if workflow is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StepEnv;
    use crate::error::Result;
    use crate::step::Checkpoint;
    use crate::types::StepOutcome;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Need {
        Dirs,
    }

    struct Empty;

    impl StepState for Empty {
        type Requirement = Need;

        fn is_satisfied(&self, _requirement: Need) -> bool {
            true
        }

        fn satisfy(&mut self, _requirement: Need, _env: &mut StepEnv<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Noop(&'static str);

    impl Step<Empty> for Noop {
        fn id(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> String {
            format!("noop {}", self.0)
        }

        fn run(&self, _state: &Empty, _env: &mut StepEnv<'_>) -> Result<StepOutcome> {
            Ok(StepOutcome::NoChange)
        }
    }

    #[test]
    fn test_workflow_preserves_order() {
        let workflow = Workflow::<Empty>::new("install")
            .then(Noop("first"))
            .then(Noop("second"))
            .then(Noop("third"));

        assert_eq!(workflow.name(), "install");
        assert_eq!(workflow.len(), 3);
        assert_eq!(workflow.step_ids(), vec!["first", "second", "third"]);
        assert_eq!(workflow.position("second"), Some(1));
        assert_eq!(workflow.position("missing"), None);
    }

    #[test]
    fn test_describe_lists_requirements() {
        let workflow = Workflow::<Empty>::new("update").then(Checkpoint::new(
            "resolve-config",
            "Resolve configuration",
            vec![Need::Dirs],
        ));

        let info = workflow.describe();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].id, "resolve-config");
        assert_eq!(info[0].requires, vec!["Dirs".to_string()]);
    }

    #[test]
    fn test_empty_workflow() {
        let workflow = Workflow::<Empty>::new("empty");
        assert!(workflow.is_empty());
    }
}
