//! CLI command implementations

pub mod environment;
pub mod resolve;
pub mod secret;
pub mod validate;

use crate::config::Workspace;
use crate::output::OutputFormat;

/// Shared state handed to every command
pub struct Context {
    pub workspace: Workspace,
    pub output: OutputFormat,
}
