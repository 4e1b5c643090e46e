//! Validation engine
//!
//! Runs an ordered list of independent rules over a resolved tree and
//! concatenates their output, rule order first, message order second.

use strata_types::{ConfigValue, ResolvedConfig, Severity, ValidationMessage};
use tracing::{debug, info, warn};

use crate::error::{Result, ValidationError};
use crate::rules::{
    PortFields, ProductionHardening, RequiredFields, UnresolvedPlaceholders, UrlFields,
    ValidationRule, WeakSecrets,
};
use crate::settings::ValidationSettings;

/// Which severities block in report-and-fail mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailOn {
    /// Only errors block (default)
    #[default]
    Error,
    /// Errors and warnings block
    Warning,
}

impl FailOn {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FailOn::Warning
        } else {
            FailOn::Error
        }
    }

    fn threshold(self) -> Severity {
        match self {
            FailOn::Error => Severity::Error,
            FailOn::Warning => Severity::Warning,
        }
    }
}

/// Summary of one validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub messages: Vec<ValidationMessage>,
}

impl ValidationReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    /// True if any message meets the blocking threshold.
    pub fn is_blocking(&self, fail_on: FailOn) -> bool {
        let threshold = fail_on.threshold();
        self.messages.iter().any(|m| m.severity >= threshold)
    }

    /// Messages at or above the `fail_on` threshold.
    pub fn blocking(&self, fail_on: FailOn) -> Vec<ValidationMessage> {
        let threshold = fail_on.threshold();
        self.messages
            .iter()
            .filter(|m| m.severity >= threshold)
            .cloned()
            .collect()
    }

    /// Convert into `Ok(messages)` or a [`ValidationError`] carrying them.
    pub fn into_result(self, fail_on: FailOn) -> Result<Vec<ValidationMessage>> {
        if self.is_blocking(fail_on) {
            Err(ValidationError::Failed {
                messages: self.messages,
            })
        } else {
            Ok(self.messages)
        }
    }
}

/// Ordered rule set.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&ValidationSettings::default())
    }
}

impl Validator {
    /// Build the default rule set from settings.
    pub fn new(settings: &ValidationSettings) -> Self {
        Self::with_rules(vec![
            Box::new(RequiredFields::new(&settings.required_fields)),
            Box::new(UrlFields::new(&settings.url_fields)),
            Box::new(PortFields::new(&settings.port_fields)),
            Box::new(ProductionHardening::new(&settings.data_store_fields)),
            Box::new(WeakSecrets::new(
                &settings.weak_secret_denylist,
                &settings.secret_key_markers,
            )),
            Box::new(UnresolvedPlaceholders),
        ])
    }

    /// Build a validator from an explicit, ordered rule list.
    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn add_rule(mut self, rule: Box<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule and return all messages.
    pub fn validate(&self, tree: &ConfigValue) -> Vec<ValidationMessage> {
        self.run(|rule| rule.check(tree))
    }

    /// Validate a resolved configuration, adding one warning per
    /// kind-changing override recorded during merging.
    ///
    /// Rules see the placeholders recorded at expansion time, so text
    /// produced by the `$${` escape is not reported as unresolved.
    pub fn validate_resolved(&self, resolved: &ResolvedConfig) -> Vec<ValidationMessage> {
        let mut messages = self.run(|rule| rule.check_resolved(resolved));
        messages.extend(resolved.overrides.iter().map(|conflict| {
            ValidationMessage::warning(
                conflict.path.clone(),
                format!(
                    "{} from profile '{}' replaces inherited {} wholesale",
                    conflict.child_kind, conflict.profile, conflict.parent_kind
                ),
            )
        }));
        messages
    }

    fn run<F>(&self, check: F) -> Vec<ValidationMessage>
    where
        F: Fn(&dyn ValidationRule) -> Vec<ValidationMessage>,
    {
        let mut messages = Vec::new();
        for rule in &self.rules {
            let found = check(rule.as_ref());
            if !found.is_empty() {
                debug!(rule = rule.name(), count = found.len(), "Rule reported findings");
            }
            messages.extend(found);
        }
        messages
    }

    /// Run every rule and summarize.
    pub fn report(&self, tree: &ConfigValue) -> ValidationReport {
        ValidationReport {
            messages: self.validate(tree),
        }
    }

    /// Fail if any error-severity message exists. Warnings and info never block.
    pub fn validate_and_fail(&self, tree: &ConfigValue) -> Result<Vec<ValidationMessage>> {
        self.validate_and_fail_with(tree, FailOn::Error)
    }

    /// Fail if any message meets the `fail_on` threshold.
    pub fn validate_and_fail_with(
        &self,
        tree: &ConfigValue,
        fail_on: FailOn,
    ) -> Result<Vec<ValidationMessage>> {
        let report = self.report(tree);
        log_report(&report);
        report.into_result(fail_on)
    }
}

fn log_report(report: &ValidationReport) {
    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    if errors > 0 {
        warn!(errors, warnings, "Configuration validation found errors");
    } else {
        info!(warnings, "Configuration validation passed");
    }
}
