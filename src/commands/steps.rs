use colored::Colorize;
use workflow::{PollConfig, StepInfo, Workflow};

use crate::cli::WorkflowKind;
use crate::resolver::Session;
use crate::{steps, ui};

pub fn run(kind: WorkflowKind) -> anyhow::Result<()> {
    let workflow: Workflow<Session> = match kind {
        WorkflowKind::Install => steps::install(PollConfig::default()),
        WorkflowKind::Update => steps::update(PollConfig::default()),
    };

    ui::header(&format!("Steps of {}", workflow.name()));
    println!();
    for line in step_lines(&workflow.describe()) {
        println!("{line}");
    }

    println!();
    ui::section("Usage Examples");
    println!();
    println!("  {} Install with prompts", "stackup -H deploy@host install".bold());
    println!(
        "  {} Install taking every default",
        "stackup -H deploy@host install --defaults".bold()
    );
    println!(
        "  {} Update an existing install",
        "stackup -H deploy@host update --root-dir /var/www".bold()
    );
    println!();
    Ok(())
}

/// One line per step: number, id, description and what it needs resolved
fn step_lines(steps: &[StepInfo]) -> Vec<String> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let needs = if step.requires.is_empty() {
                String::new()
            } else {
                format!(" [{}]", step.requires.join(", "))
            };
            format!(
                "  {:>2}. {:<22} {}{}",
                i + 1,
                step.id,
                step.description,
                needs
            )
        })
        .collect()
}
