//! Environment commands: switch, list, current, backups, restore, prune

use std::io::IsTerminal;

use colored::*;
use serde::Serialize;
use strata_switch::{
    Backup, Confirmer, DenyConfirmer, DialoguerConfirmer, ScriptedConfirmer, SwitchController,
    SwitchOutcome,
};
use strata_types::EnvironmentDescriptor;
use tabled::Tabled;

use crate::commands::Context;
use crate::error::{CliError, CliResult};
use crate::output::{self, print_info, print_success, print_warning, OutputFormat};

/// Table row for environment display
#[derive(Debug, Serialize, Tabled)]
struct EnvironmentRow {
    /// Marks the active environment
    #[tabled(rename = "")]
    #[serde(skip)]
    marker: String,
    name: String,
    profile: String,
    prerequisites: String,
    confirm: String,
    protected: String,
    #[tabled(skip)]
    active: bool,
}

impl EnvironmentRow {
    fn new(descriptor: &EnvironmentDescriptor, active: bool) -> Self {
        let prerequisites = if descriptor.prerequisites.is_empty() {
            "-".to_string()
        } else {
            descriptor.prerequisites.join(", ")
        };
        Self {
            marker: if active { "●" } else { "" }.to_string(),
            name: descriptor.name.clone(),
            profile: descriptor.source_profile.clone(),
            prerequisites,
            confirm: yes_no(descriptor.confirmation_required),
            protected: yes_no(descriptor.protected),
            active,
        }
    }
}

/// Table row for backup display
#[derive(Debug, Serialize, Tabled)]
struct BackupRow {
    id: String,
    environment: String,
    timestamp: String,
    size: u64,
}

impl From<Backup> for BackupRow {
    fn from(b: Backup) -> Self {
        Self {
            id: b.id,
            environment: b.environment,
            timestamp: b.timestamp.to_rfc3339(),
            size: b.size,
        }
    }
}

fn yes_no(flag: bool) -> String {
    let s = if flag { "yes" } else { "no" };
    s.to_string()
}

fn controller(ctx: &Context, confirmer: Box<dyn Confirmer>) -> SwitchController {
    let workspace = &ctx.workspace;
    let controller = SwitchController::new(
        workspace.resolver(),
        workspace.config.environments.clone(),
        workspace.active_pointer(),
        workspace.backup_store(),
    )
    .with_validator(workspace.validator())
    .with_prerequisites(workspace.prerequisites())
    .with_confirmer(confirmer);

    if workspace.config.binding.on_switch {
        controller.with_binding(workspace.config.binding.prefixes.clone())
    } else {
        controller
    }
}

/// Pick the confirmation source: an explicit answer, the terminal, or
/// nothing (which declines).
fn confirmer(answer: Option<String>) -> Box<dyn Confirmer> {
    match answer {
        Some(answer) => Box::new(ScriptedConfirmer::new([answer])),
        None if std::io::stdin().is_terminal() => Box::new(DialoguerConfirmer),
        None => Box::new(DenyConfirmer),
    }
}

fn report_outcome(outcome: SwitchOutcome, format: OutputFormat, verb: &str) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            for warning in &outcome.warnings {
                print_warning(warning);
            }
            if outcome.applied {
                print_success(&format!("{} {}", verb, outcome.environment.bold()));
                if let Some(backup) = &outcome.backup {
                    print_info(&format!("Previous state backed up as {}", backup.id));
                }
            }
        }
        format => output::print_single(&outcome, format)?,
    }
    outcome.into_result()?;
    Ok(())
}

/// Switch the active environment.
pub fn switch(ctx: &Context, environment: &str, force: bool, answer: Option<String>) -> CliResult<()> {
    let outcome = controller(ctx, confirmer(answer)).switch(environment, force);
    report_outcome(outcome, ctx.output, "Switched to")
}

/// List configured environments.
pub fn list(ctx: &Context) -> CliResult<()> {
    let controller = controller(ctx, Box::new(DenyConfirmer));
    let active = controller.current()?.map(|state| state.environment);
    let rows: Vec<EnvironmentRow> = controller
        .list()
        .iter()
        .map(|d| EnvironmentRow::new(d, active.as_deref() == Some(d.name.as_str())))
        .collect();
    output::print_output(rows, ctx.output)
}

/// Show the active environment.
pub fn current(ctx: &Context) -> CliResult<()> {
    let state = ctx.workspace.active_pointer().read()?;
    match (ctx.output, state) {
        (OutputFormat::Table, None) => print_info("No active environment"),
        (OutputFormat::Table, Some(state)) => {
            println!("Environment: {}", state.environment.bold());
            println!("Profile:     {}", state.profile);
            println!("Switched at: {}", state.switched_at.to_rfc3339());
        }
        (format, state) => output::print_single(&state, format)?,
    }
    Ok(())
}

/// List stored backups, newest first.
pub fn backups(ctx: &Context) -> CliResult<()> {
    let backups = ctx.workspace.backup_store().list()?;
    let rows: Vec<BackupRow> = backups.into_iter().map(BackupRow::from).collect();
    output::print_output(rows, ctx.output)
}

/// Restore the active environment from a backup.
pub fn restore(ctx: &Context, backup_id: &str, yes: bool) -> CliResult<()> {
    if !yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Restore backup {}? The active environment will be replaced.",
                backup_id
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            return Err(CliError::Aborted);
        }
    }

    let outcome = controller(ctx, Box::new(DenyConfirmer)).restore_backup(backup_id);
    report_outcome(outcome, ctx.output, "Restored")
}

/// Delete all but the newest backups.
pub fn prune(ctx: &Context, keep: usize) -> CliResult<()> {
    let removed = controller(ctx, Box::new(DenyConfirmer)).prune_backups(keep)?;
    match ctx.output {
        OutputFormat::Table => print_success(&format!(
            "Pruned {} backup(s), kept the newest {}",
            removed.len(),
            keep
        )),
        format => {
            let rows: Vec<BackupRow> = removed.into_iter().map(BackupRow::from).collect();
            output::print_output(rows, format)?;
        }
    }
    Ok(())
}
