//! Append-only audit trail of searches.

use crate::error::HistoryError;
use crate::search::{NormalizedQuery, SearchMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Entries returned by a listing when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Opaque identity of the requesting user, only used to tag entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(String);

impl UserRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Uuid,
    pub user: UserRef,
    pub query: NormalizedQuery,
    pub mode: SearchMode,
    pub result_count: usize,
    pub sources_searched: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl SearchHistoryEntry {
    pub fn new(
        user: UserRef,
        query: NormalizedQuery,
        mode: SearchMode,
        result_count: usize,
        sources_searched: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            query,
            mode,
            result_count,
            sources_searched,
            timestamp: Utc::now(),
        }
    }
}

/// Persistence for history entries. Append-only.
pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: &SearchHistoryEntry) -> Result<(), HistoryError>;

    /// Entries of `user`, newest first.
    fn list(
        &self,
        user: &UserRef,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<SearchHistoryEntry>, HistoryError>;
}

fn newest_first(
    entries: impl DoubleEndedIterator<Item = SearchHistoryEntry>,
    user: &UserRef,
    skip: usize,
    limit: usize,
) -> Vec<SearchHistoryEntry> {
    let mut matching: Vec<_> = entries.filter(|e| &e.user == user).collect();
    // Appends are chronological; the stable sort only matters for
    // hand-edited files.
    matching.reverse();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    matching.into_iter().skip(skip).take(limit).collect()
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<SearchHistoryEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, entry: &SearchHistoryEntry) -> Result<(), HistoryError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| HistoryError::Other("history store poisoned".into()))?;
        guard.push(entry.clone());
        Ok(())
    }

    fn list(
        &self,
        user: &UserRef,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<SearchHistoryEntry>, HistoryError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| HistoryError::Other("history store poisoned".into()))?;
        Ok(newest_first(guard.iter().cloned(), user, skip, limit))
    }
}

/// JSON-lines file store. The file and its directory are created on the
/// first append.
pub struct FileHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    fn append(&self, entry: &SearchHistoryEntry) -> Result<(), HistoryError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| HistoryError::Other("history file lock poisoned".into()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn list(
        &self,
        user: &UserRef,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<SearchHistoryEntry>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SearchHistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping unreadable history line"
                ),
            }
        }
        Ok(newest_first(entries.into_iter(), user, skip, limit))
    }
}

/// Writes history entries off the response path.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Append `entry` on a blocking worker and return immediately.
    ///
    /// Failures (including a panicking store) are logged and end there;
    /// the handle only reports completion.
    pub fn record(&self, entry: SearchHistoryEntry) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let write = tokio::task::spawn_blocking(move || {
            match store.append(&entry) {
                Ok(()) => debug!(entry = %entry.id, user = %entry.user, "search history recorded"),
                Err(e) => error!(entry = %entry.id, user = %entry.user, error = %e, "failed to record search history"),
            }
        });
        tokio::spawn(async move {
            if let Err(e) = write.await {
                error!(error = %e, "history recorder task failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn entry(user: &str, count: usize) -> SearchHistoryEntry {
        SearchHistoryEntry::new(
            UserRef::new(user),
            NormalizedQuery::new().with_last_name("Doe"),
            SearchMode::Manual,
            count,
            vec!["ancestry".into()],
        )
    }

    struct Broken;

    impl HistoryStore for Broken {
        fn append(&self, _entry: &SearchHistoryEntry) -> Result<(), HistoryError> {
            Err(HistoryError::Other("disk full".into()))
        }

        fn list(
            &self,
            _user: &UserRef,
            _skip: usize,
            _limit: usize,
        ) -> Result<Vec<SearchHistoryEntry>, HistoryError> {
            Ok(Vec::new())
        }
    }

    struct Exploding;

    impl HistoryStore for Exploding {
        fn append(&self, _entry: &SearchHistoryEntry) -> Result<(), HistoryError> {
            panic!("store exploded");
        }

        fn list(
            &self,
            _user: &UserRef,
            _skip: usize,
            _limit: usize,
        ) -> Result<Vec<SearchHistoryEntry>, HistoryError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_in_memory_lists_newest_first_per_user() {
        let store = InMemoryHistoryStore::new();
        let mut first = entry("alice", 1);
        first.timestamp -= Duration::seconds(10);
        store.append(&first).unwrap();
        store.append(&entry("bob", 2)).unwrap();
        store.append(&entry("alice", 3)).unwrap();

        let alice = store.list(&UserRef::new("alice"), 0, DEFAULT_HISTORY_LIMIT).unwrap();
        let counts: Vec<_> = alice.iter().map(|e| e.result_count).collect();
        assert_eq!(counts, vec![3, 1]);

        let page = store.list(&UserRef::new("alice"), 1, 1).unwrap();
        assert_eq!(page[0].result_count, 1);
        assert!(store.list(&UserRef::new("carol"), 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_round_trip_and_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");
        let store = FileHistoryStore::new(&path);

        assert!(store.list(&UserRef::new("alice"), 0, 10).unwrap().is_empty());

        let written = entry("alice", 4);
        store.append(&written).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"not json\n\n")
            .unwrap();
        store.append(&entry("alice", 5)).unwrap();

        let listed = store.list(&UserRef::new("alice"), 0, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1], written);
    }

    #[tokio::test]
    async fn test_recorder_writes_in_background() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let recorder = HistoryRecorder::new(store.clone());
        recorder.record(entry("alice", 1)).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_recorder_contains_failures() {
        let recorder = HistoryRecorder::new(Arc::new(Broken));
        assert!(recorder.record(entry("alice", 1)).await.is_ok());

        let recorder = HistoryRecorder::new(Arc::new(Exploding));
        assert!(recorder.record(entry("alice", 1)).await.is_ok());
    }
}
