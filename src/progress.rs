//! Terminal progress for workflow runs
//!
//! Each step gets a numbered line and, unless the run is interactive, an
//! indicatif spinner while it works. Interactive runs skip the spinner so it
//! never draws over a prompt.

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use workflow::{Error, ProgressCallback, StepOutcome};

use crate::ui;

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Prints step progress to the terminal
pub struct ConsoleProgress {
    total: usize,
    spin: bool,
    current: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new(interactive: bool) -> Self {
        Self {
            total: 0,
            spin: !interactive,
            current: None,
        }
    }

    fn clear(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

/// One-line summary of a step outcome
pub fn outcome_line(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Changed => "changed".to_string(),
        StepOutcome::NoChange => "ok".to_string(),
        StepOutcome::Skipped { reason } => format!("skipped: {reason}"),
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_workflow_start(&mut self, name: &str, steps: usize) {
        self.total = steps;
        ui::section(&format!("Running {name} ({steps} steps)"));
    }

    fn on_step_start(&mut self, index: usize, _id: &str, description: &str) {
        ui::step(index + 1, self.total, description);
        if self.spin {
            self.current = Some(spinner("working..."));
        }
    }

    fn on_step_complete(&mut self, _id: &str, outcome: &StepOutcome) {
        self.clear();
        let line = outcome_line(outcome);
        match outcome {
            StepOutcome::Changed => println!("  {} {}", "✓".green(), line),
            StepOutcome::NoChange => println!("  {} {}", "✓".green(), line.dimmed()),
            StepOutcome::Skipped { .. } => println!("  {} {}", "↷".yellow(), line.dimmed()),
        }
    }

    fn on_step_failed(&mut self, id: &str, error: &Error) {
        self.clear();
        println!("  {} {id}: {error}", "✗".red());
    }

    fn on_workflow_complete(&mut self) {
        self.clear();
    }
}
