//! Cross-process switch lock
//!
//! An exclusive advisory lock on a file next to the active environment
//! file. Two `strata` processes pointed at the same state directory cannot
//! be inside a switch, restore or prune at the same time.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::Result;

/// File name of the lock, created beside the active file.
pub const LOCK_FILE: &str = ".switch.lock";

/// Lock path for an active file at `active`.
pub(crate) fn lock_path_for(active: &Path) -> PathBuf {
    active.with_file_name(LOCK_FILE)
}

/// A held lock. Released when dropped.
#[derive(Debug)]
pub(crate) struct SwitchLock {
    file: File,
}

impl SwitchLock {
    /// Take the lock without waiting. `None` if another holder has it.
    pub(crate) fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(path = %path.display(), "Switch lock acquired");
                Ok(Some(Self { file }))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SwitchLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_holder_is_refused_until_release() {
        let dir = TempDir::new().unwrap();
        let path = lock_path_for(&dir.path().join("state/active.json"));
        assert_eq!(path, dir.path().join("state").join(LOCK_FILE));

        let held = SwitchLock::try_acquire(&path).unwrap();
        assert!(held.is_some());
        assert!(SwitchLock::try_acquire(&path).unwrap().is_none());

        drop(held);
        assert!(SwitchLock::try_acquire(&path).unwrap().is_some());
    }
}
