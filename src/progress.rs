use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Persisted progress of a resumable scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub target: String,
    pub tested_paths: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Paths an earlier run already attempted, loaded once before generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeState {
    pub target: Option<String>,
    pub tested_paths: Vec<String>,
}

impl ResumeState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_paths(target: impl Into<String>, tested_paths: Vec<String>) -> Self {
        Self {
            target: Some(target.into()),
            tested_paths,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tested_paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tested_paths.len()
    }

    /// Lookup set handed to the path generator.
    pub fn skip_set(&self) -> HashSet<String> {
        self.tested_paths.iter().cloned().collect()
    }
}

/// Reads, writes and removes the progress snapshot file.
///
/// Writers serialize on an internal lock and replace the whole file through a
/// temporary sibling, so readers never observe a half-written snapshot.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load prior state. Absent or malformed files yield an empty state.
    pub fn load(&self) -> ResumeState {
        load_resume_state(&self.path)
    }

    /// Overwrite the snapshot file.
    pub fn save(&self, target: &str, tested_paths: &[String]) -> Result<()> {
        let snapshot = ProgressSnapshot {
            target: target.to_string(),
            tested_paths: tested_paths.to_vec(),
            timestamp: OffsetDateTime::now_utc(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, body)
            .with_context(|| format!("failed to write progress file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace progress file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), tested = tested_paths.len(), "progress saved");
        Ok(())
    }

    /// Like [`save`](Self::save) but only logs failures.
    pub fn save_or_warn(&self, target: &str, tested_paths: &[String]) {
        if let Err(e) = self.save(target, tested_paths) {
            warn!(error = %e, "could not save progress; scan continues");
        }
    }

    /// Delete the snapshot file. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "progress file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove progress file: {}", self.path.display())),
        }
    }
}

/// Load a progress snapshot from `path`, returning an empty state when the
/// file is absent or cannot be parsed.
pub fn load_resume_state(path: impl AsRef<Path>) -> ResumeState {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ResumeState::empty(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read progress file; starting fresh");
            return ResumeState::empty();
        }
    };
    match serde_json::from_str::<ProgressSnapshot>(&content) {
        Ok(snapshot) => ResumeState::from_paths(snapshot.target, snapshot.tested_paths),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed progress file; starting fresh");
            ResumeState::empty()
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "progress".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("missing.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_resume_state(&path), ResumeState::empty());
    }

    #[test]
    fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        let tested = vec!["login".to_string(), "admin".to_string()];
        store.save("http://example.com/", &tested).unwrap();

        let state = store.load();
        assert_eq!(state.target.as_deref(), Some("http://example.com/"));
        assert_eq!(state.tested_paths, tested);
        assert!(!dir.path().join("progress.json.tmp").exists());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        store.save("http://example.com/", &[]).unwrap();
        store.remove().unwrap();
        assert!(!store.path().exists());
        store.remove().unwrap();
    }

    #[test]
    fn save_into_missing_dir_only_warns() {
        let store = ProgressStore::new("/nonexistent-dir/for/progress.json");
        assert!(store.save("t", &[]).is_err());
        store.save_or_warn("t", &[]);
    }
}
