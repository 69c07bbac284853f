//! Progress persistence
//!
//! One JSON document per user, whole-aggregate replace on save. Writes
//! are optimistic: every save compares the stored `version` against the
//! version the caller loaded and bumps it on success, so a racing writer
//! gets `ConcurrentUpdateConflict` instead of silently clobbering the
//! other update. Creation goes through `create_new` so two concurrent
//! first-calls for a user cannot both create a document.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::model::UserProgress;
use crate::error::{ProgressError, Result};

/// Persistence boundary for progress aggregates
pub trait ProgressStore {
    /// Fetch a user's aggregate, `None` when the user has no document
    fn get(&self, user_id: &str) -> Result<Option<UserProgress>>;

    /// Fetch the aggregate, creating a zeroed one if absent
    ///
    /// Safe under concurrent first-calls: exactly one document is created
    /// and both callers observe it.
    fn get_or_create(&self, user_id: &str) -> Result<UserProgress> {
        if let Some(existing) = self.get(user_id)? {
            return Ok(existing);
        }
        let mut fresh = UserProgress::new(user_id);
        match self.save(&mut fresh) {
            Ok(()) => Ok(fresh),
            // Lost the creation race; the winner's document is authoritative
            Err(ProgressError::ConcurrentUpdateConflict { .. }) => self
                .get(user_id)?
                .ok_or_else(|| ProgressError::NotFound(format!("user {user_id}"))),
            Err(err) => Err(err),
        }
    }

    /// Persist the whole aggregate
    ///
    /// `progress.version` must match the stored version (0 for a new
    /// document); it is incremented in place on success.
    fn save(&self, progress: &mut UserProgress) -> Result<()>;
}

/// File-backed store: `<dir>/<user>.json` per user
///
/// Saves serialize on an internal lock so the version check and the write
/// are one atomic step within this process. Multi-process deployments
/// need a store backed by a database that does its own compare-and-swap.
#[derive(Debug)]
pub struct JsonProgressStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonProgressStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| ProgressError::StorageUnavailable(format!("create {:?}: {e}", dir)))?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    fn document_path(&self, user_id: &str) -> PathBuf {
        // Keep ids filesystem-safe without assuming anything about their shape
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn read_document(&self, path: &Path) -> Result<Option<UserProgress>> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProgressError::StorageUnavailable(format!("read {:?}: {e}", path))),
        }
    }

    /// Write via a temp file in the same directory, then rename, so a
    /// partially written document is never visible
    fn write_document(&self, path: &Path, progress: &UserProgress) -> Result<()> {
        let contents = serde_json::to_string_pretty(progress)?;
        let tmp = path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp)
            .map_err(|e| ProgressError::StorageUnavailable(format!("create {:?}: {e}", tmp)))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| ProgressError::StorageUnavailable(format!("write {:?}: {e}", tmp)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| ProgressError::StorageUnavailable(format!("rename {:?}: {e}", tmp)))?;
        Ok(())
    }

    /// Claim the path with `create_new` and write the document through the
    /// same handle, so the file is never observable empty
    fn create_document(&self, path: &Path, progress: &UserProgress) -> Result<()> {
        let contents = serde_json::to_string_pretty(progress)?;
        let mut file = match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ProgressError::ConcurrentUpdateConflict {
                    user_id: progress.user_id.clone(),
                    expected: 0,
                });
            }
            Err(e) => {
                return Err(ProgressError::StorageUnavailable(format!("create {:?}: {e}", path)));
            }
        };
        file.write_all(contents.as_bytes())
            .map_err(|e| ProgressError::StorageUnavailable(format!("write {:?}: {e}", path)))?;
        Ok(())
    }
}

impl ProgressStore for JsonProgressStore {
    fn get(&self, user_id: &str) -> Result<Option<UserProgress>> {
        self.read_document(&self.document_path(user_id))
    }

    fn save(&self, progress: &mut UserProgress) -> Result<()> {
        let path = self.document_path(&progress.user_id);

        // Hold the lock across check and write so two racing savers
        // cannot both pass the version comparison
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ProgressError::StorageUnavailable("store mutex poisoned".into()))?;

        if progress.version == 0 {
            progress.version = 1;
            if let Err(err) = self.create_document(&path, progress) {
                progress.version = 0;
                return Err(err);
            }
            debug!(user = %progress.user_id, version = progress.version, "progress created");
            return Ok(());
        }

        let stored = self.read_document(&path)?.ok_or_else(|| {
            ProgressError::NotFound(format!("user {} document vanished", progress.user_id))
        })?;
        if stored.version != progress.version {
            return Err(ProgressError::ConcurrentUpdateConflict {
                user_id: progress.user_id.clone(),
                expected: progress.version,
            });
        }

        progress.version += 1;
        if let Err(err) = self.write_document(&path, progress) {
            progress.version -= 1;
            return Err(err);
        }
        debug!(user = %progress.user_id, version = progress.version, "progress saved");
        Ok(())
    }
}

/// In-memory store with the same CAS semantics, for tests
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    documents: Mutex<HashMap<String, UserProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| ProgressError::StorageUnavailable("store mutex poisoned".into()))?;
        Ok(documents.get(user_id).cloned())
    }

    fn save(&self, progress: &mut UserProgress) -> Result<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| ProgressError::StorageUnavailable("store mutex poisoned".into()))?;
        let stored_version = documents.get(&progress.user_id).map_or(0, |d| d.version);
        if stored_version != progress.version {
            return Err(ProgressError::ConcurrentUpdateConflict {
                user_id: progress.user_id.clone(),
                expected: progress.version,
            });
        }
        progress.version += 1;
        documents.insert(progress.user_id.clone(), progress.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn get_missing_user_is_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();
        assert!(store.get("nobody").unwrap().is_none());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let mut progress = UserProgress::new("u1");
        progress.topic_mut("t1").earned_score = 40;
        store.save(&mut progress).unwrap();
        assert_eq!(progress.version, 1);

        let loaded = store.get("u1").unwrap().unwrap();
        assert_eq!(loaded, progress);
    }

    #[test]
    fn stale_version_save_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let mut original = UserProgress::new("u1");
        store.save(&mut original).unwrap();

        let mut copy_a = store.get("u1").unwrap().unwrap();
        let mut copy_b = store.get("u1").unwrap().unwrap();

        store.save(&mut copy_a).unwrap();
        let err = store.save(&mut copy_b).unwrap_err();
        assert!(matches!(err, ProgressError::ConcurrentUpdateConflict { .. }));
        // Loser's in-memory version is untouched so it can re-read and retry
        assert_eq!(copy_b.version, 1);
    }

    #[test]
    fn double_create_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let mut first = UserProgress::new("u1");
        store.save(&mut first).unwrap();

        let mut second = UserProgress::new("u1");
        let err = store.save(&mut second).unwrap_err();
        assert!(matches!(err, ProgressError::ConcurrentUpdateConflict { expected: 0, .. }));
    }

    #[test]
    fn get_or_create_returns_existing_document() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let mut existing = UserProgress::new("u1");
        existing.total_points = 50;
        store.save(&mut existing).unwrap();

        let fetched = store.get_or_create("u1").unwrap();
        assert_eq!(fetched.total_points, 50);
    }

    #[test]
    fn get_or_create_creates_zeroed_document() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let fresh = store.get_or_create("u2").unwrap();
        assert_eq!(fresh.total_points, 0);
        assert_eq!(fresh.version, 1);
        assert!(store.get("u2").unwrap().is_some());
    }

    #[test]
    fn awkward_user_ids_map_to_safe_filenames() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let mut progress = UserProgress::new("auth0|user/1");
        store.save(&mut progress).unwrap();
        let loaded = store.get("auth0|user/1").unwrap().unwrap();
        assert_eq!(loaded.user_id, "auth0|user/1");
    }

    #[test]
    fn created_document_is_complete_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::open(dir.path()).unwrap();

        let mut progress = UserProgress::new("u1");
        store.save(&mut progress).unwrap();

        // The on-disk file is a full document, not a placeholder
        let raw = std::fs::read_to_string(dir.path().join("u1.json")).unwrap();
        let parsed: UserProgress = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, progress);
        assert_eq!(parsed.version, 1);
    }

    #[test]
    fn racing_writers_never_lose_updates() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(JsonProgressStore::open(dir.path()).unwrap());
        let mut seed = UserProgress::new("u1");
        store.save(&mut seed).unwrap();

        let mut handles = Vec::new();
        for topic_id in ["left", "right"] {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..20 {
                    loop {
                        let mut progress = store.get("u1").unwrap().unwrap();
                        progress.topic_mut(topic_id).earned_score += 1;
                        match store.save(&mut progress) {
                            Ok(()) => break,
                            Err(ProgressError::ConcurrentUpdateConflict { .. }) => continue,
                            Err(err) => panic!("unexpected store error: {err}"),
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every increment from both writers survived
        let merged = store.get("u1").unwrap().unwrap();
        assert_eq!(merged.topics["left"].earned_score, 20);
        assert_eq!(merged.topics["right"].earned_score, 20);
        assert_eq!(merged.version, 41);
    }

    #[test]
    fn memory_store_matches_cas_semantics() {
        let store = MemoryProgressStore::new();
        let mut progress = UserProgress::new("u1");
        store.save(&mut progress).unwrap();

        let mut stale = UserProgress::new("u1");
        assert!(matches!(
            store.save(&mut stale),
            Err(ProgressError::ConcurrentUpdateConflict { .. })
        ));

        let mut current = store.get("u1").unwrap().unwrap();
        store.save(&mut current).unwrap();
        assert_eq!(current.version, 2);
    }
}
