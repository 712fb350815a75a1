// ── StateStore ──
//
// load() distinguishes "no file" (empty state), "cannot read the file"
// (`CoreError::Persistence`) and "file content is bad"
// (`CoreError::CorruptState`). commit() writes a temp file in the same
// directory, fsyncs it, and renames it over the old file, so a reader
// sees either the previous state or the new one, never a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::file::StateFile;
use crate::error::CoreError;
use crate::model::StateMap;

const TEMP_PREFIX: &str = ".meshwatch-state.";
const TEMP_SUFFIX: &str = ".tmp";

/// Durable record of the last known status per device.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted mapping. A missing file is an empty mapping.
    pub fn load(&self) -> Result<StateMap, CoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, starting empty");
                return Ok(StateMap::new());
            }
            Err(source) => {
                return Err(CoreError::Persistence {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let file: StateFile = serde_json::from_slice(&raw).map_err(|e| CoreError::CorruptState {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        file.validate().map_err(|reason| CoreError::CorruptState {
            path: self.path.clone(),
            reason,
        })?;

        debug!(
            path = %self.path.display(),
            devices = file.devices.len(),
            saved_at = %file.saved_at,
            "state loaded"
        );
        Ok(file.devices)
    }

    /// Startup policy: load, or start fresh if the file is unreadable.
    ///
    /// A corrupt file is moved aside (`{path}.corrupt-{unix_ts}`) so the
    /// next commit does not destroy it. A file that exists but cannot be
    /// read is left where it is. Temp files left by an interrupted commit
    /// are removed first.
    pub fn load_or_recover(&self) -> StateMap {
        self.sweep_stale_temps();
        match self.load() {
            Ok(state) => state,
            Err(err @ CoreError::Persistence { .. }) => {
                error!(
                    path = %self.path.display(),
                    error = %err,
                    "state file cannot be read; starting from empty state, previously seen devices will be reported again"
                );
                StateMap::new()
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    error = %err,
                    "state file unreadable; starting from empty state, previously seen devices will be reported again"
                );
                match self.quarantine() {
                    Ok(moved) => warn!(to = %moved.display(), "corrupt state file preserved"),
                    Err(e) => warn!(error = %e, "could not preserve corrupt state file"),
                }
                StateMap::new()
            }
        }
    }

    /// Atomically replace the persisted mapping with `state`.
    pub fn commit(&self, state: &StateMap) -> Result<(), CoreError> {
        self.write_atomic(state).map_err(|source| CoreError::Persistence {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), devices = state.len(), "state committed");
        Ok(())
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn write_atomic(&self, state: &StateMap) -> io::Result<()> {
        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;

        let file = StateFile::new(state.clone(), Utc::now());
        serde_json::to_writer_pretty(tmp.as_file_mut(), &file)?;
        tmp.as_file_mut().write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path).map_err(|e| e.error)?;
        sync_dir(dir);
        Ok(())
    }

    /// Remove temp files a crashed commit never renamed into place.
    fn sweep_stale_temps(&self) {
        let Ok(entries) = fs::read_dir(self.dir()) else {
            return;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !(name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)) {
                continue;
            }
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = name, error = %e, "could not remove stale temp file"),
            }
        }
        if removed > 0 {
            info!(dir = %self.dir().display(), removed, "removed stale state temp files");
        }
    }

    fn quarantine(&self) -> io::Result<PathBuf> {
        let mut target = self.path.clone().into_os_string();
        target.push(format!(".corrupt-{}", Utc::now().timestamp()));
        let target = PathBuf::from(target);
        fs::rename(&self.path, &target)?;
        Ok(target)
    }
}

/// Make the rename itself durable. Best effort: not every filesystem lets
/// a directory be opened for syncing.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DeviceId, StateRecord};

    fn sample() -> StateMap {
        let at = Utc.timestamp_opt(1_718_000_000, 0).unwrap();
        [("n1", true), ("n2", false)]
            .into_iter()
            .map(|(id, online)| {
                (
                    DeviceId::from(id),
                    StateRecord {
                        device_id: id.into(),
                        display_name: format!("host-{id}"),
                        online,
                        last_updated: at,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn commit_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/data/state.json"));

        store.commit(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn commit_replaces_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        store.commit(&sample()).unwrap();
        let mut next = sample();
        next.remove(&DeviceId::from("n2"));
        store.commit(&next).unwrap();

        assert_eq!(store.load().unwrap(), next);
    }

    #[test]
    fn commit_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.commit(&sample()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["state.json".to_string()]);
    }

    #[test]
    fn interrupted_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);
        store.commit(&sample()).unwrap();

        // A crash mid-commit leaves a truncated temp file that never got
        // renamed into place.
        let full = fs::read(&path).unwrap();
        fs::write(
            dir.path().join(".meshwatch-state.abc123.tmp"),
            &full[..full.len() / 2],
        )
        .unwrap();

        assert_eq!(StateStore::new(&path).load().unwrap(), sample());
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);
        store.commit(&sample()).unwrap();

        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..full.len() / 2]).unwrap();

        assert!(matches!(store.load(), Err(CoreError::CorruptState { .. })));
    }

    #[test]
    fn foreign_json_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        // Flat layout without an envelope.
        fs::write(&path, r#"{"n1": {"name": "laptop", "online": true}}"#).unwrap();

        let err = StateStore::new(&path).load().unwrap_err();
        assert!(matches!(err, CoreError::CorruptState { .. }), "got {err:?}");
    }

    #[test]
    fn mismatched_key_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);
        store.commit(&sample()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replacen("\"n1\": {", "\"n9\": {", 1)).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, CoreError::CorruptState { ref reason, .. } if reason.contains("n9")));
    }

    #[test]
    fn recover_quarantines_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{\"format\": \"meshwatch-state\", \"vers").unwrap();

        let store = StateStore::new(&path);
        assert!(store.load_or_recover().is_empty());
        assert!(!path.exists());

        let preserved = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .any(|name| name.starts_with("state.json.corrupt-"));
        assert!(preserved);

        // The next commit starts a fresh, valid file.
        store.commit(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn unreadable_path_is_persistence_error_and_not_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        // A directory sits where the state file should be.
        let path = dir.path().join("state.json");
        fs::create_dir(&path).unwrap();

        let store = StateStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, CoreError::Persistence { .. }), "got {err:?}");

        assert!(store.load_or_recover().is_empty());
        assert!(path.is_dir());
        let quarantined = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .any(|name| name.contains(".corrupt-"));
        assert!(!quarantined);
    }

    #[test]
    fn recover_sweeps_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);
        store.commit(&sample()).unwrap();

        fs::write(dir.path().join(".meshwatch-state.abc123.tmp"), b"{\"form").unwrap();
        fs::write(dir.path().join(".meshwatch-state.def456.tmp"), b"").unwrap();
        fs::write(dir.path().join("notes.tmp"), b"keep").unwrap();

        assert_eq!(store.load_or_recover(), sample());

        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["notes.tmp".to_string(), "state.json".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn commit_into_unwritable_location_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let store = StateStore::new(blocker.join("state.json"));
        let err = store.commit(&sample()).unwrap_err();
        assert!(matches!(err, CoreError::Persistence { .. }), "got {err:?}");
    }
}
