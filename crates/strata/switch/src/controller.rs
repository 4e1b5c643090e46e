//! Environment switch controller
//!
//! Owns the active environment pointer. A switch moves through
//!
//! ```text
//! Idle -> Validating -> CheckingPrerequisites -> AwaitingConfirmation
//!      -> BackingUp -> Applying -> Done
//! ```
//!
//! and any rejection ends in `Failed`. The pointer is only written in
//! `Applying`, after the previous state has been backed up and verified,
//! so every failure leaves the active file byte-for-byte unchanged.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use strata_profiles::ProfileResolver;
use strata_types::{EnvironmentDescriptor, ResolvedConfig};
use strata_validation::{FailOn, ValidationReport, Validator};
use tracing::{info, instrument, warn};

use crate::active::{ActivePointer, ActiveState};
use crate::backup::{Backup, BackupStore, NO_ENVIRONMENT};
use crate::confirm::{is_confirmed, Confirmer, DenyConfirmer};
use crate::error::{Result, SwitchError};
use crate::lock::{lock_path_for, SwitchLock};
use crate::prerequisite::PrerequisiteRegistry;

/// Switch workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchState {
    Idle,
    Validating,
    CheckingPrerequisites,
    AwaitingConfirmation,
    BackingUp,
    Applying,
    Done,
    Failed,
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchState::Idle => "IDLE",
            SwitchState::Validating => "VALIDATING",
            SwitchState::CheckingPrerequisites => "CHECKING_PREREQUISITES",
            SwitchState::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            SwitchState::BackingUp => "BACKING_UP",
            SwitchState::Applying => "APPLYING",
            SwitchState::Done => "DONE",
            SwitchState::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Result of a switch or restore.
#[derive(Debug, Serialize)]
pub struct SwitchOutcome {
    pub environment: String,
    pub applied: bool,
    pub backup: Option<Backup>,
    pub errors: Vec<String>,
    /// Non-blocking validation findings
    pub warnings: Vec<String>,
    pub state: SwitchState,
    pub trail: Vec<SwitchState>,
    #[serde(skip)]
    pub error: Option<SwitchError>,
}

impl SwitchOutcome {
    fn start(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            applied: false,
            backup: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            state: SwitchState::Idle,
            trail: vec![SwitchState::Idle],
            error: None,
        }
    }

    fn enter(&mut self, state: SwitchState) {
        self.state = state;
        self.trail.push(state);
    }

    fn fail(mut self, error: SwitchError) -> Self {
        warn!(environment = %self.environment, from = %self.state, %error, "Switch failed");
        self.errors = error.messages();
        self.error = Some(error);
        self.enter(SwitchState::Failed);
        self
    }

    fn done(mut self) -> Self {
        self.applied = true;
        self.enter(SwitchState::Done);
        self
    }

    /// `Ok(self)` if applied, otherwise the error that stopped it.
    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Drives switches and restores of the active environment.
pub struct SwitchController {
    environments: Vec<EnvironmentDescriptor>,
    resolver: ProfileResolver,
    binding: Option<Vec<String>>,
    validator: Validator,
    prerequisites: PrerequisiteRegistry,
    confirmer: Box<dyn Confirmer>,
    active: ActivePointer,
    backups: BackupStore,
    critical: Mutex<()>,
    lock_path: PathBuf,
}

impl SwitchController {
    pub fn new(
        resolver: ProfileResolver,
        environments: Vec<EnvironmentDescriptor>,
        active: ActivePointer,
        backups: BackupStore,
    ) -> Self {
        let lock_path = lock_path_for(active.path());
        Self {
            environments,
            resolver,
            binding: None,
            validator: Validator::default(),
            prerequisites: PrerequisiteRegistry::new(),
            confirmer: Box::new(DenyConfirmer),
            active,
            backups,
            critical: Mutex::new(()),
            lock_path,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: PrerequisiteRegistry) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_confirmer(mut self, confirmer: Box<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    /// Overlay prefix-grouped environment variables after resolution.
    pub fn with_binding(mut self, prefixes: Vec<String>) -> Self {
        self.binding = Some(prefixes);
        self
    }

    /// Configured environments, in declaration order.
    pub fn list(&self) -> &[EnvironmentDescriptor] {
        &self.environments
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentDescriptor> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// The active environment, if any.
    pub fn current(&self) -> Result<Option<ActiveState>> {
        self.active.read()
    }

    /// Stored backups, newest first.
    pub fn backups(&self) -> Result<Vec<Backup>> {
        self.backups.list()
    }

    /// Delete all but the newest `keep` backups.
    pub fn prune_backups(&self, keep: usize) -> Result<Vec<Backup>> {
        let _held = self.enter_critical()?;
        self.backups.prune(keep)
    }

    /// Take the in-process guard, then the lock file shared with other
    /// processes. Neither waits.
    fn enter_critical(&self) -> Result<(MutexGuard<'_, ()>, SwitchLock)> {
        let guard = self
            .critical
            .try_lock()
            .ok_or(SwitchError::ConcurrentSwitchRejected)?;
        let lock = SwitchLock::try_acquire(&self.lock_path)?
            .ok_or(SwitchError::ConcurrentSwitchRejected)?;
        Ok((guard, lock))
    }

    /// Resolve and validate an environment's profile without switching.
    pub fn preview(&self, name: &str) -> Result<(ResolvedConfig, ValidationReport)> {
        let descriptor = self
            .environment(name)
            .ok_or_else(|| SwitchError::UnknownEnvironment(name.to_string()))?;
        self.resolve_and_validate(descriptor)
    }

    /// Switch the active environment to `target`.
    ///
    /// `force` skips prerequisites and confirmation. Validation always runs.
    #[instrument(skip(self))]
    pub fn switch(&self, target: &str, force: bool) -> SwitchOutcome {
        let mut outcome = SwitchOutcome::start(target);
        let _held = match self.enter_critical() {
            Ok(held) => held,
            Err(e) => return outcome.fail(e),
        };

        let Some(descriptor) = self.environment(target) else {
            return outcome.fail(SwitchError::UnknownEnvironment(target.to_string()));
        };

        outcome.enter(SwitchState::Validating);
        let (resolved, report) = match self.resolve_and_validate(descriptor) {
            Ok(checked) => checked,
            Err(e) => return outcome.fail(e),
        };
        outcome.warnings = report.messages.iter().map(|m| m.to_string()).collect();

        if !force {
            outcome.enter(SwitchState::CheckingPrerequisites);
            let failures = self.prerequisites.evaluate(&descriptor.prerequisites);
            if !failures.is_empty() {
                return outcome.fail(SwitchError::PrerequisiteNotMet(failures));
            }

            if descriptor.confirmation_required {
                outcome.enter(SwitchState::AwaitingConfirmation);
                let answer = self.confirmer.prompt(&descriptor.name);
                if !is_confirmed(&descriptor.name, answer.as_deref()) {
                    return outcome.fail(SwitchError::ConfirmationDeclined {
                        environment: descriptor.name.clone(),
                    });
                }
            }
        } else {
            info!(environment = %descriptor.name, "Forced switch skips prerequisites and confirmation");
        }

        let state = ActiveState {
            environment: descriptor.name.clone(),
            profile: descriptor.source_profile.clone(),
            switched_at: Utc::now(),
            config: resolved.tree,
        };
        let bytes = match state.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return outcome.fail(e),
        };
        self.backup_then_replace(outcome, Some(&bytes))
    }

    /// Restore the active file from a stored backup.
    ///
    /// The pre-restore state is backed up first, so a restore can itself
    /// be restored.
    #[instrument(skip(self))]
    pub fn restore_backup(&self, id: &str) -> SwitchOutcome {
        let mut outcome = SwitchOutcome::start(id);
        let _held = match self.enter_critical() {
            Ok(held) => held,
            Err(e) => return outcome.fail(e),
        };

        outcome.enter(SwitchState::Validating);
        let backup = match self.backups.get(id) {
            Ok(backup) => backup,
            Err(e) => return outcome.fail(e),
        };
        outcome.environment = backup.environment.clone();
        let snapshot = match self.backups.read(&backup) {
            Ok(bytes) => bytes,
            Err(e) => return outcome.fail(e),
        };
        if !snapshot.is_empty() {
            if let Err(e) = ActiveState::from_bytes(&snapshot, &backup.location) {
                return outcome.fail(e);
            }
        }

        let replacement = (!snapshot.is_empty()).then_some(snapshot.as_slice());
        self.backup_then_replace(outcome, replacement)
    }

    fn resolve_and_validate(
        &self,
        descriptor: &EnvironmentDescriptor,
    ) -> Result<(ResolvedConfig, ValidationReport)> {
        let resolved = match &self.binding {
            Some(prefixes) => self
                .resolver
                .resolve_bound(&descriptor.source_profile, prefixes)?,
            None => self.resolver.resolve(&descriptor.source_profile)?,
        };

        let report = ValidationReport {
            messages: self.validator.validate_resolved(&resolved),
        };
        let fail_on = FailOn::from_strict(descriptor.protected);
        if report.is_blocking(fail_on) {
            return Err(SwitchError::Validation(report.blocking(fail_on)));
        }
        Ok((resolved, report))
    }

    /// Back up the current active file, then replace it. `None` clears it.
    fn backup_then_replace(
        &self,
        mut outcome: SwitchOutcome,
        replacement: Option<&[u8]>,
    ) -> SwitchOutcome {
        outcome.enter(SwitchState::BackingUp);
        let previous = match self.active.read_bytes() {
            Ok(previous) => previous,
            Err(e) => return outcome.fail(e),
        };
        let label = match &previous {
            None => NO_ENVIRONMENT.to_string(),
            Some(bytes) => ActiveState::from_bytes(bytes, self.active.path())
                .map(|s| s.environment)
                .unwrap_or_else(|_| "unknown".to_string()),
        };
        let backup = match self
            .backups
            .create(&label, previous.as_deref().unwrap_or_default())
        {
            Ok(backup) => backup,
            Err(e) => return outcome.fail(e),
        };
        outcome.backup = Some(backup);

        outcome.enter(SwitchState::Applying);
        let applied = match replacement {
            Some(bytes) => self.active.replace(bytes),
            None => self.active.clear(),
        };
        if let Err(e) = applied {
            return outcome.fail(e);
        }

        info!(
            environment = %outcome.environment,
            backup = outcome.backup.as_ref().map(|b| b.id.as_str()),
            "Active environment updated"
        );
        outcome.done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ScriptedConfirmer;
    use crate::prerequisite::FnPrerequisite;
    use std::sync::{mpsc, Arc};
    use strata_profiles::InMemoryProfileStore;
    use tempfile::TempDir;

    const BASE: &str = "app:\n  name: shop\n  environment: development\n  debug: true\nserver:\n  port: 8080\n";
    const STAGING: &str = "extends: base\napp:\n  environment: staging\n  debug: false\n";
    const PRODUCTION: &str = "extends: base\napp:\n  environment: production\n  debug: false\ndatabase:\n  url: postgres://db:5432/shop?sslmode=require\n";
    const BROKEN: &str = "extends: base\napp:\n  environment: production\n";

    fn resolver() -> ProfileResolver {
        let store = InMemoryProfileStore::new()
            .with_yaml("base", BASE)
            .unwrap()
            .with_yaml("staging", STAGING)
            .unwrap()
            .with_yaml("production", PRODUCTION)
            .unwrap()
            .with_yaml("broken", BROKEN)
            .unwrap();
        ProfileResolver::new(Arc::new(store)).with_env(Default::default())
    }

    fn environments() -> Vec<EnvironmentDescriptor> {
        vec![
            EnvironmentDescriptor::new("dev", "base"),
            EnvironmentDescriptor::new("staging", "staging").with_confirmation(),
            EnvironmentDescriptor::new("production", "production")
                .with_prerequisite("vpn")
                .with_prerequisite("mfa")
                .with_confirmation()
                .protected(),
            EnvironmentDescriptor::new("broken", "broken"),
            EnvironmentDescriptor::new("ghost", "missing"),
        ]
    }

    fn prerequisites() -> PrerequisiteRegistry {
        PrerequisiteRegistry::new()
            .with(FnPrerequisite::new("vpn", || Ok(())))
            .with(FnPrerequisite::new("mfa", || {
                Err("MFA token not present".to_string())
            }))
    }

    fn controller(dir: &TempDir, confirmer: Box<dyn Confirmer>) -> SwitchController {
        SwitchController::new(
            resolver(),
            environments(),
            ActivePointer::new(dir.path().join("active.json")),
            BackupStore::new(dir.path().join("backups")),
        )
        .with_prerequisites(prerequisites())
        .with_confirmer(confirmer)
    }

    fn active_bytes(dir: &TempDir) -> Option<Vec<u8>> {
        std::fs::read(dir.path().join("active.json")).ok()
    }

    #[test]
    fn test_switch_without_gates() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));

        let outcome = controller.switch("dev", false);
        assert!(outcome.applied, "{:?}", outcome.errors);
        assert_eq!(
            outcome.trail,
            vec![
                SwitchState::Idle,
                SwitchState::Validating,
                SwitchState::CheckingPrerequisites,
                SwitchState::BackingUp,
                SwitchState::Applying,
                SwitchState::Done
            ]
        );
        let backup = outcome.backup.unwrap();
        assert_eq!(backup.environment, NO_ENVIRONMENT);
        assert!(backup.is_empty_state());

        let current = controller.current().unwrap().unwrap();
        assert_eq!(current.environment, "dev");
        assert_eq!(current.config.get("server.port").and_then(|v| v.as_i64()), Some(8080));
    }

    #[test]
    fn test_failed_mfa_leaves_active_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(ScriptedConfirmer::new(["production"])));
        assert!(controller.switch("dev", false).applied);
        let before = active_bytes(&dir).unwrap();
        let backups_before = controller.backups().unwrap().len();

        let outcome = controller.switch("production", false);
        assert!(!outcome.applied);
        assert_eq!(outcome.state, SwitchState::Failed);
        assert!(outcome.errors.iter().any(|e| e.contains("MFA")));
        assert!(outcome.backup.is_none());
        assert_eq!(active_bytes(&dir).unwrap(), before);
        assert_eq!(controller.backups().unwrap().len(), backups_before);
        assert!(matches!(
            outcome.into_result(),
            Err(SwitchError::PrerequisiteNotMet(_))
        ));
    }

    #[test]
    fn test_confirmed_staging_switch() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(ScriptedConfirmer::new(["staging"])));

        let outcome = controller.switch("staging", false);
        assert!(outcome.applied, "{:?}", outcome.errors);
        assert!(outcome.trail.contains(&SwitchState::AwaitingConfirmation));
        assert!(outcome.backup.is_some());
        assert_eq!(controller.backups().unwrap().len(), 1);
        assert_eq!(controller.current().unwrap().unwrap().environment, "staging");
    }

    #[test]
    fn test_wrong_echo_creates_no_backup() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(ScriptedConfirmer::new(["stagign"])));

        let outcome = controller.switch("staging", false);
        assert!(!outcome.applied);
        assert!(matches!(
            outcome.error,
            Some(SwitchError::ConfirmationDeclined { .. })
        ));
        assert!(controller.backups().unwrap().is_empty());
        assert!(active_bytes(&dir).is_none());
        assert!(controller.current().unwrap().is_none());
    }

    #[test]
    fn test_force_skips_gates_but_not_validation() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));

        let outcome = controller.switch("production", true);
        assert!(outcome.applied, "{:?}", outcome.errors);
        assert!(!outcome.trail.contains(&SwitchState::CheckingPrerequisites));
        assert!(!outcome.trail.contains(&SwitchState::AwaitingConfirmation));

        let outcome = controller.switch("broken", true);
        assert!(!outcome.applied);
        assert!(outcome.errors.iter().any(|e| e.contains("app.debug")));
        assert_eq!(controller.current().unwrap().unwrap().environment, "production");
    }

    #[test]
    fn test_unknown_environment_and_missing_profile() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));

        let outcome = controller.switch("qa", false);
        assert!(matches!(
            outcome.error,
            Some(SwitchError::UnknownEnvironment(_))
        ));
        assert_eq!(outcome.trail, vec![SwitchState::Idle, SwitchState::Failed]);

        let outcome = controller.switch("ghost", false);
        assert!(matches!(outcome.error, Some(SwitchError::Profile(_))));
        assert!(controller.backups().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_switch_is_rejected() {
        struct BlockingConfirmer {
            entered: Mutex<mpsc::Sender<()>>,
            release: Mutex<mpsc::Receiver<()>>,
        }

        impl Confirmer for BlockingConfirmer {
            fn prompt(&self, environment: &str) -> Option<String> {
                self.entered.lock().send(()).ok()?;
                self.release.lock().recv().ok()?;
                Some(environment.to_string())
            }
        }

        let dir = TempDir::new().unwrap();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let controller = controller(
            &dir,
            Box::new(BlockingConfirmer {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
        );

        std::thread::scope(|s| {
            let first = s.spawn(|| controller.switch("staging", false));
            entered_rx.recv().unwrap();

            let second = controller.switch("dev", false);
            assert!(matches!(
                second.error,
                Some(SwitchError::ConcurrentSwitchRejected)
            ));
            assert!(matches!(
                controller.restore_backup("anything").error,
                Some(SwitchError::ConcurrentSwitchRejected)
            ));

            release_tx.send(()).unwrap();
            assert!(first.join().unwrap().applied);
        });

        assert_eq!(controller.current().unwrap().unwrap().environment, "staging");
        assert_eq!(controller.backups().unwrap().len(), 1);
    }

    #[test]
    fn test_restore_is_undoable() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(ScriptedConfirmer::new(["staging"])));
        let initial = controller.switch("dev", false).backup.unwrap();
        let dev_bytes = active_bytes(&dir).unwrap();
        let before_staging = controller.switch("staging", false).backup.unwrap();
        assert_eq!(before_staging.environment, "dev");

        let outcome = controller.restore_backup(&before_staging.id);
        assert!(outcome.applied, "{:?}", outcome.errors);
        assert_eq!(outcome.environment, "dev");
        assert_eq!(active_bytes(&dir).unwrap(), dev_bytes);
        let pre_restore = outcome.backup.unwrap();
        assert_eq!(pre_restore.environment, "staging");
        assert_eq!(controller.backups().unwrap().len(), 3);

        // restoring the state from before anything was active clears the pointer
        let outcome = controller.restore_backup(&initial.id);
        assert!(outcome.applied);
        assert!(controller.current().unwrap().is_none());

        let outcome = controller.restore_backup(&pre_restore.id);
        assert!(outcome.applied);
        assert_eq!(controller.current().unwrap().unwrap().environment, "staging");
    }

    #[test]
    fn test_restore_unknown_backup() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));
        let outcome = controller.restore_backup("dev__20260101T000000.000000Z");
        assert!(matches!(outcome.error, Some(SwitchError::BackupNotFound(_))));
        assert!(controller.backups().unwrap().is_empty());
    }

    #[test]
    fn test_prune_backups() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));
        for _ in 0..4 {
            assert!(controller.switch("dev", false).applied);
        }
        assert_eq!(controller.prune_backups(2).unwrap().len(), 2);
        assert_eq!(controller.backups().unwrap().len(), 2);
    }

    #[test]
    fn test_protected_environment_validates_strictly() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryProfileStore::new()
            .with_yaml("base", BASE)
            .unwrap()
            .with_yaml(
                "plain-db",
                "extends: base\napp:\n  environment: production\n  debug: false\ndatabase:\n  url: postgres://db:5432/shop\n",
            )
            .unwrap();
        let resolver = ProfileResolver::new(Arc::new(store)).with_env(Default::default());
        let controller = SwitchController::new(
            resolver,
            vec![
                EnvironmentDescriptor::new("lenient", "plain-db"),
                EnvironmentDescriptor::new("strict", "plain-db").protected(),
            ],
            ActivePointer::new(dir.path().join("active.json")),
            BackupStore::new(dir.path().join("backups")),
        );

        let lenient = controller.switch("lenient", false);
        assert!(lenient.applied);
        assert_eq!(lenient.warnings.len(), 1);

        let strict = controller.switch("strict", false);
        assert!(!strict.applied);
        assert!(strict.errors.iter().any(|e| e.contains("database")));
    }

    #[test]
    fn test_preview_does_not_switch() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));

        let (resolved, report) = controller.preview("staging").unwrap();
        assert_eq!(resolved.chain, vec!["base", "staging"]);
        assert!(report.messages.is_empty(), "{:?}", report.messages);

        assert!(matches!(
            controller.preview("broken"),
            Err(SwitchError::Validation(_))
        ));
        assert!(matches!(
            controller.preview("qa"),
            Err(SwitchError::UnknownEnvironment(_))
        ));
        assert!(active_bytes(&dir).is_none());
        assert!(controller.backups().unwrap().is_empty());
    }

    #[test]
    fn test_escaped_placeholder_passes_protected_validation() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryProfileStore::new()
            .with_yaml("base", BASE)
            .unwrap()
            .with_yaml("production", PRODUCTION)
            .unwrap()
            .with_yaml(
                "escaped",
                "extends: production\napp:\n  banner: \"literal $${NOT_A_VAR}\"\n",
            )
            .unwrap()
            .with_yaml(
                "leaky",
                "extends: production\napp:\n  banner: \"${NOT_A_VAR}\"\n",
            )
            .unwrap();
        let resolver = ProfileResolver::new(Arc::new(store)).with_env(Default::default());
        let controller = SwitchController::new(
            resolver,
            vec![
                EnvironmentDescriptor::new("escaped", "escaped").protected(),
                EnvironmentDescriptor::new("leaky", "leaky").protected(),
            ],
            ActivePointer::new(dir.path().join("active.json")),
            BackupStore::new(dir.path().join("backups")),
        );

        let outcome = controller.switch("escaped", true);
        assert!(outcome.applied, "{:?}", outcome.errors);
        let current = controller.current().unwrap().unwrap();
        assert_eq!(
            current.config.get("app.banner").and_then(|v| v.as_str()),
            Some("literal ${NOT_A_VAR}")
        );

        let outcome = controller.switch("leaky", true);
        assert!(!outcome.applied);
        assert!(outcome.errors.iter().any(|e| e.contains("NOT_A_VAR")));
        assert_eq!(controller.current().unwrap().unwrap().environment, "escaped");
    }

    #[test]
    fn test_backup_failure_leaves_active_file() {
        let dir = TempDir::new().unwrap();
        assert!(controller(&dir, Box::new(DenyConfirmer)).switch("dev", false).applied);
        let before = active_bytes(&dir).unwrap();

        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let controller = SwitchController::new(
            resolver(),
            environments(),
            ActivePointer::new(dir.path().join("active.json")),
            BackupStore::new(blocker.join("backups")),
        );

        let outcome = controller.switch("staging", true);
        assert!(!outcome.applied);
        assert!(matches!(
            outcome.error,
            Some(SwitchError::BackupWriteFailure(_))
        ));
        assert!(outcome.trail.contains(&SwitchState::BackingUp));
        assert!(!outcome.trail.contains(&SwitchState::Applying));
        assert!(outcome.backup.is_none());
        assert_eq!(active_bytes(&dir).unwrap(), before);
    }

    #[test]
    fn test_lock_held_by_another_process_rejects() {
        use fs2::FileExt;

        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, Box::new(DenyConfirmer));
        assert!(controller.switch("dev", false).applied);
        let before = active_bytes(&dir).unwrap();

        // A separate open file description stands in for another process.
        let other = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(dir.path().join(crate::lock::LOCK_FILE))
            .unwrap();
        FileExt::try_lock_exclusive(&other).unwrap();

        let outcome = controller.switch("staging", true);
        assert!(matches!(
            outcome.error,
            Some(SwitchError::ConcurrentSwitchRejected)
        ));
        assert!(matches!(
            controller.prune_backups(0),
            Err(SwitchError::ConcurrentSwitchRejected)
        ));
        assert_eq!(active_bytes(&dir).unwrap(), before);
        assert_eq!(controller.backups().unwrap().len(), 1);

        FileExt::unlock(&other).unwrap();
        assert!(controller.switch("staging", true).applied);
    }
}
