//! Validate command

use serde::Serialize;
use strata_types::{Severity, ValidationMessage};
use strata_validation::{FailOn, ValidationReport};
use tabled::Tabled;

use crate::commands::Context;
use crate::error::{CliError, CliResult};
use crate::output::{self, print_success, OutputFormat};

/// Table row for a validation message
#[derive(Debug, Serialize, Tabled)]
struct MessageRow {
    severity: String,
    field: String,
    message: String,
    value: String,
}

impl From<&ValidationMessage> for MessageRow {
    fn from(m: &ValidationMessage) -> Self {
        Self {
            severity: m.severity.to_string(),
            field: m.field.to_string(),
            message: m.message.clone(),
            value: m
                .offending_value
                .as_ref()
                .map(|v| v.display_scalar())
                .unwrap_or_default(),
        }
    }
}

/// Pick the profile to validate: the one named, or the active one.
fn target_profile(ctx: &Context, profile: Option<String>) -> CliResult<String> {
    match profile {
        Some(profile) => Ok(profile),
        None => ctx
            .workspace
            .active_pointer()
            .read()?
            .map(|state| state.profile)
            .ok_or_else(|| {
                CliError::InvalidInput(
                    "no profile given and no environment is active".to_string(),
                )
            }),
    }
}

/// Resolve a profile and report every validation message.
///
/// Environment variables are bound exactly when `switch` binds them, so the
/// tree checked here is the tree a switch would apply.
///
/// Fails when any message meets the blocking threshold: errors always,
/// warnings too under `--strict`.
pub fn validate(ctx: &Context, profile: Option<String>, strict: bool, quiet: bool) -> CliResult<()> {
    let profile = target_profile(ctx, profile)?;
    let resolver = ctx.workspace.resolver();
    let binding = &ctx.workspace.config.binding;
    let resolved = if binding.on_switch {
        resolver.resolve_bound(&profile, &binding.prefixes)?
    } else {
        resolver.resolve(&profile)?
    };
    let report = ValidationReport {
        messages: ctx.workspace.validator().validate_resolved(&resolved),
    };

    if !quiet {
        match ctx.output {
            OutputFormat::Table if report.messages.is_empty() => {
                print_success(&format!("Profile {} is valid", profile))
            }
            format => {
                let rows: Vec<MessageRow> = report.messages.iter().map(MessageRow::from).collect();
                output::print_output(rows, format)?;
            }
        }
    }

    if report.is_blocking(FailOn::from_strict(strict)) {
        return Err(CliError::Validation {
            errors: report.count(Severity::Error),
            warnings: report.count(Severity::Warning),
        });
    }
    Ok(())
}
