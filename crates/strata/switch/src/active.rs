//! Active environment pointer
//!
//! A single JSON file naming the active environment and holding its
//! resolved configuration. Replacement goes through a temp file that is
//! fsynced and renamed over the target, so readers see either the old or
//! the new content. Temp names carry the process id and a counter, so
//! writers never share one.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_types::ConfigValue;
use tracing::debug;

use crate::error::{Result, SwitchError};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Contents of the active environment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveState {
    pub environment: String,
    pub profile: String,
    pub switched_at: DateTime<Utc>,
    pub config: ConfigValue,
}

impl ActiveState {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| SwitchError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| SwitchError::CorruptState {
            path: origin.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Handle on the active environment file.
#[derive(Debug, Clone)]
pub struct ActivePointer {
    path: PathBuf,
}

impl ActivePointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file bytes, or `None` if nothing is active.
    pub fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parsed active state, or `None` if nothing is active.
    pub fn read(&self) -> Result<Option<ActiveState>> {
        self.read_bytes()?
            .map(|bytes| ActiveState::from_bytes(&bytes, &self.path))
            .transpose()
    }

    /// Atomically replace the file's contents.
    pub(crate) fn replace(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.tmp_path();
        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| std::fs::rename(&tmp_path, &self.path)) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = bytes.len(), "Active environment replaced");
        Ok(())
    }

    /// Remove the file, leaving no environment active.
    pub(crate) fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        self.path.with_file_name(name)
    }
}
