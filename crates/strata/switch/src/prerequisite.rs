//! Prerequisite predicates gating an environment switch
//!
//! A prerequisite is a named check such as "VPN connected" or "MFA token
//! present". Checks report a reason on failure; the controller evaluates
//! all of an environment's prerequisites and collects every failure.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A named boolean check.
pub trait Prerequisite: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(())` if the check holds, otherwise the reason it does not.
    fn check(&self) -> std::result::Result<(), String>;
}

/// Holds when an environment variable is set and non-empty.
pub struct EnvVarPrerequisite {
    name: String,
    var: String,
    message: Option<String>,
}

impl EnvVarPrerequisite {
    pub fn new(name: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var: var.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Prerequisite for EnvVarPrerequisite {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> std::result::Result<(), String> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(()),
            _ => Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("environment variable {} is not set", self.var))),
        }
    }
}

/// Holds when a file exists.
pub struct FilePrerequisite {
    name: String,
    path: PathBuf,
    message: Option<String>,
}

impl FilePrerequisite {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Prerequisite for FilePrerequisite {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.path.exists() {
            Ok(())
        } else {
            Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} does not exist", self.path.display())))
        }
    }
}

/// Holds when a command exits successfully.
pub struct CommandPrerequisite {
    name: String,
    program: String,
    args: Vec<String>,
    message: Option<String>,
}

impl CommandPrerequisite {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Prerequisite for CommandPrerequisite {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> std::result::Result<(), String> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        let failure = match status {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => format!("`{}` exited with {}", self.program, status),
            Err(e) => format!("`{}` could not be run: {}", self.program, e),
        };
        Err(self.message.clone().unwrap_or(failure))
    }
}

/// Prerequisite backed by a closure.
pub struct FnPrerequisite {
    name: String,
    check: Box<dyn Fn() -> std::result::Result<(), String> + Send + Sync>,
}

impl FnPrerequisite {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }
}

impl Prerequisite for FnPrerequisite {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> std::result::Result<(), String> {
        (self.check)()
    }
}

/// Declarative prerequisite definition, as written in the engine config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PrerequisiteSpec {
    Env {
        var: String,
        #[serde(default)]
        message: Option<String>,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        message: Option<String>,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl PrerequisiteSpec {
    pub fn build(&self, name: &str) -> Arc<dyn Prerequisite> {
        match self {
            PrerequisiteSpec::Env { var, message } => {
                let mut p = EnvVarPrerequisite::new(name, var);
                p.message = message.clone();
                Arc::new(p)
            }
            PrerequisiteSpec::File { path, message } => {
                let mut p = FilePrerequisite::new(name, path);
                p.message = message.clone();
                Arc::new(p)
            }
            PrerequisiteSpec::Command {
                program,
                args,
                message,
            } => {
                let mut p = CommandPrerequisite::new(name, program, args.clone());
                p.message = message.clone();
                Arc::new(p)
            }
        }
    }
}

/// Named prerequisites available to environment descriptors.
#[derive(Default, Clone)]
pub struct PrerequisiteRegistry {
    checks: BTreeMap<String, Arc<dyn Prerequisite>>,
}

impl PrerequisiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from declarative definitions keyed by name.
    pub fn from_specs(specs: &BTreeMap<String, PrerequisiteSpec>) -> Self {
        let mut registry = Self::new();
        for (name, spec) in specs {
            registry.register(spec.build(name));
        }
        registry
    }

    pub fn register(&mut self, check: Arc<dyn Prerequisite>) {
        self.checks.insert(check.name().to_string(), check);
    }

    pub fn with(mut self, check: impl Prerequisite + 'static) -> Self {
        self.register(Arc::new(check));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.keys().map(String::as_str).collect()
    }

    /// Evaluate every named check and return all failures as
    /// `"<name>: <reason>"`. Unknown names fail.
    pub fn evaluate(&self, names: &[String]) -> Vec<String> {
        let mut failures = Vec::new();
        for name in names {
            match self.checks.get(name) {
                Some(check) => {
                    if let Err(reason) = check.check() {
                        debug!(prerequisite = %name, %reason, "Prerequisite failed");
                        failures.push(format!("{}: {}", name, reason));
                    }
                }
                None => failures.push(format!("{}: unknown prerequisite", name)),
            }
        }
        failures
    }
}
