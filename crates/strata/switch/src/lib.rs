//! Strata Switch - Failure-safe switching of the active environment
//!
//! The [`SwitchController`] is the only writer of the active environment
//! file. A switch resolves and validates the target profile, checks the
//! environment's prerequisites, asks for confirmation, backs up the
//! current state and only then replaces the active file atomically. Any
//! rejection leaves the active file untouched.
//!
//! Only one switch, restore or prune runs at a time, both within a process
//! and across processes sharing the state directory. A concurrent attempt
//! fails immediately with [`SwitchError::ConcurrentSwitchRejected`].

pub mod active;
pub mod backup;
pub mod confirm;
pub mod controller;
pub mod error;
mod lock;
pub mod prerequisite;

pub use active::{ActivePointer, ActiveState};
pub use backup::{Backup, BackupStore, NO_ENVIRONMENT};
pub use confirm::{Confirmer, DenyConfirmer, DialoguerConfirmer, ScriptedConfirmer};
pub use controller::{SwitchController, SwitchOutcome, SwitchState};
pub use error::{Result, SwitchError};
pub use lock::LOCK_FILE;
pub use prerequisite::{
    CommandPrerequisite, EnvVarPrerequisite, FilePrerequisite, FnPrerequisite, Prerequisite,
    PrerequisiteRegistry, PrerequisiteSpec,
};
