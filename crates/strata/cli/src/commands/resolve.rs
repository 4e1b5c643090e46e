//! Profile inspection commands: resolve, profiles

use serde::Serialize;
use tabled::Tabled;

use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, print_warning, OutputFormat};

/// Table row for profile display
#[derive(Debug, Serialize, Tabled)]
struct ProfileRow {
    name: String,
    extends: String,
    chain: String,
}

/// Print the resolved tree of a profile.
///
/// With `secrets`, every configured secret-backed field that has no literal
/// value is fetched and filled in.
pub fn resolve(ctx: &Context, profile: &str, bind: bool, secrets: bool) -> CliResult<()> {
    let resolver = ctx.workspace.resolver();
    let resolved = if bind {
        resolver.resolve_bound(profile, &ctx.workspace.config.binding.prefixes)?
    } else {
        resolver.resolve(profile)?
    };

    if ctx.output == OutputFormat::Table {
        for conflict in &resolved.overrides {
            print_warning(&conflict.to_string());
        }
    }
    if secrets {
        let tree = ctx.workspace.secret_resolver().resolve_all(&resolved.tree)?;
        output::print_single(&tree, ctx.output)
    } else {
        output::print_single(&resolved.tree, ctx.output)
    }
}

/// List available profiles with their inheritance chains.
pub fn profiles(ctx: &Context) -> CliResult<()> {
    let resolver = ctx.workspace.resolver();
    let mut rows = Vec::new();
    for name in resolver.profiles()? {
        let ancestry = resolver.ancestry(&name)?;
        let extends = ancestry
            .first()
            .and_then(|p| p.parent.clone())
            .unwrap_or_else(|| "-".to_string());
        let chain = ancestry
            .iter()
            .rev()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ");
        rows.push(ProfileRow {
            name,
            extends,
            chain,
        });
    }
    output::print_output(rows, ctx.output)
}
