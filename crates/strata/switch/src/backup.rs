//! Timestamped backups of the active environment file
//!
//! One file per backup, named `<environment>__<UTC timestamp>.snapshot`.
//! Every write is read back and its SHA-256 digest compared before the
//! backup is reported as taken. Backups are only ever deleted by
//! [`BackupStore::prune`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Result, SwitchError};

const EXTENSION: &str = "snapshot";
const SEPARATOR: &str = "__";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y%m%dT%H%M%S%.fZ";

/// Environment label for a backup taken when nothing was active.
pub const NO_ENVIRONMENT: &str = "none";

/// A stored backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    /// File stem, used as the backup reference
    pub id: String,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
    pub location: PathBuf,
    pub size: u64,
}

impl Backup {
    fn from_path(path: &Path) -> Option<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return None;
        }
        let id = path.file_stem()?.to_str()?.to_string();
        let (environment, stamp) = id.rsplit_once(SEPARATOR)?;
        let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_PARSE_FORMAT).ok()?;
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Some(Self {
            environment: environment.to_string(),
            timestamp: Utc.from_utc_datetime(&naive),
            location: path.to_path_buf(),
            size,
            id,
        })
    }

    /// Whether the snapshot records "no active environment".
    pub fn is_empty_state(&self) -> bool {
        self.size == 0
    }
}

/// Directory of backup files.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot, read it back and verify its digest.
    pub fn create(&self, environment: &str, snapshot: &[u8]) -> Result<Backup> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            SwitchError::BackupWriteFailure(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut timestamp = Utc::now();
        let (path, mut file) = loop {
            let path = self.path_for(environment, timestamp);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    timestamp += Duration::microseconds(1);
                }
                Err(e) => {
                    return Err(SwitchError::BackupWriteFailure(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        };

        let written = file
            .write_all(snapshot)
            .and_then(|_| file.sync_all())
            .map_err(|e| SwitchError::BackupWriteFailure(format!("{}: {}", path.display(), e)));
        drop(file);
        if let Err(e) = written.and_then(|_| verify(&path, snapshot)) {
            if let Err(remove_err) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %remove_err, "Failed to remove bad backup");
            }
            return Err(e);
        }

        let backup = Backup::from_path(&path).ok_or_else(|| {
            SwitchError::BackupWriteFailure(format!("unreadable backup name {}", path.display()))
        })?;
        info!(backup = %backup.id, environment, bytes = snapshot.len(), "Backup written");
        Ok(backup)
    }

    /// All backups, newest first.
    pub fn list(&self) -> Result<Vec<Backup>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let path = entry?.path();
            match Backup::from_path(&path) {
                Some(backup) => backups.push(backup),
                None => debug!(path = %path.display(), "Skipping non-backup file"),
            }
        }
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(backups)
    }

    /// Look up a backup by id.
    pub fn get(&self, id: &str) -> Result<Backup> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(SwitchError::BackupNotFound(id.to_string()));
        }
        let path = self.dir.join(format!("{}.{}", id, EXTENSION));
        if !path.is_file() {
            return Err(SwitchError::BackupNotFound(id.to_string()));
        }
        Backup::from_path(&path).ok_or_else(|| SwitchError::BackupNotFound(id.to_string()))
    }

    /// Read a backup's snapshot bytes.
    pub fn read(&self, backup: &Backup) -> Result<Vec<u8>> {
        Ok(std::fs::read(&backup.location)?)
    }

    /// Delete all but the newest `keep` backups. Returns the deleted ones.
    pub fn prune(&self, keep: usize) -> Result<Vec<Backup>> {
        let backups = self.list()?;
        let mut removed = Vec::new();
        for backup in backups.into_iter().skip(keep) {
            std::fs::remove_file(&backup.location)?;
            removed.push(backup);
        }
        info!(kept = keep, removed = removed.len(), "Pruned backups");
        Ok(removed)
    }

    fn path_for(&self, environment: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}.{}",
            environment,
            SEPARATOR,
            timestamp.format(TIMESTAMP_FORMAT),
            EXTENSION
        ))
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn verify(path: &Path, expected: &[u8]) -> Result<()> {
    let actual = std::fs::read(path)
        .map_err(|e| SwitchError::BackupWriteFailure(format!("{}: {}", path.display(), e)))?;
    let (want, got) = (digest(expected), digest(&actual));
    if want != got {
        return Err(SwitchError::BackupWriteFailure(format!(
            "{}: digest mismatch (expected {}, got {})",
            path.display(),
            want,
            got
        )));
    }
    Ok(())
}
