//! On-disk snapshot store.
//!
//! One JSON file per token so that links survive a restart. Writes take an
//! exclusive `fs2` lock and reads a shared one, which keeps several server
//! processes pointed at the same directory from tearing each other's files.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use tracing::{debug, info, warn};

use super::{SnapshotStore, StoreError};
use crate::clock::{Clock, SystemClock};
use crate::snapshot::{CartSnapshot, StoreEntry};
use crate::token::Token;

const FILE_PREFIX: &str = "vortex_";
const FILE_EXTENSION: &str = "json";

/// Snapshot store that keeps each entry in `<dir>/vortex_<token>.json`.
pub struct FileSnapshotStore {
    dir: Arc<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FileSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSnapshotStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl FileSnapshotStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Snapshot store initialized at {:?}", dir);
        Ok(Self {
            dir: Arc::new(dir),
            clock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run blocking file work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || work(&dir))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn entry_path(dir: &Path, token: &Token) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{token}.{FILE_EXTENSION}"))
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().map(|e| e == FILE_EXTENSION).unwrap_or(false)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(FILE_PREFIX))
            .unwrap_or(false)
}

/// Write an entry under an exclusive lock. The file is only truncated once
/// the lock is held, and a failed write removes the partial file.
fn write_entry(path: &Path, entry: &StoreEntry) -> Result<(), StoreError> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    let result = file
        .lock_exclusive()
        .map_err(StoreError::from)
        .and_then(|()| write_locked(&file, entry));

    let unlocked = file.unlock();
    if let Err(e) = result {
        if let Err(cleanup) = remove_entry(path) {
            warn!("Failed to remove partial snapshot {:?}: {}", path, cleanup);
        }
        return Err(e);
    }
    unlocked?;
    Ok(())
}

fn write_locked(file: &fs::File, entry: &StoreEntry) -> Result<(), StoreError> {
    file.set_len(0)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, entry)?;
    writer.flush()?;
    file.sync_all()?;
    Ok(())
}

/// Read an entry; `Ok(None)` if the file is absent.
fn read_entry(path: &Path) -> Result<Option<StoreEntry>, StoreError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let result = serde_json::from_reader(reader);

    file.unlock()?;
    Ok(Some(result?))
}

fn remove_entry(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Decide whether a file found during a purge should go.
fn should_purge(path: &Path, now: DateTime<Utc>) -> bool {
    match read_entry(path) {
        Ok(Some(entry)) => !entry.is_live(now),
        Ok(None) => false,
        Err(e) => {
            warn!("Removing unreadable snapshot {:?}: {}", path, e);
            true
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn put(
        &self,
        token: &Token,
        snapshot: &CartSnapshot,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let entry = StoreEntry::new(token.clone(), snapshot.clone(), self.clock.now(), ttl);
        self.blocking(move |dir| {
            let path = entry_path(dir, &entry.token);
            write_entry(&path, &entry)?;
            debug!("Saved snapshot {} to {:?}", entry.token, path);
            Ok(())
        })
        .await
    }

    async fn get(&self, token: &Token) -> Result<Option<CartSnapshot>, StoreError> {
        let token = token.clone();
        let now = self.clock.now();
        self.blocking(move |dir| {
            let path = entry_path(dir, &token);
            let entry = match read_entry(&path) {
                Ok(entry) => entry,
                Err(StoreError::Serialization(e)) => {
                    warn!("Ignoring corrupt snapshot {:?}: {}", path, e);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            match entry {
                Some(entry) if entry.is_live(now) => Ok(Some(entry.snapshot)),
                Some(_) => {
                    remove_entry(&path)?;
                    debug!("Dropped expired snapshot {}", token);
                    Ok(None)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        self.blocking(move |dir| {
            let mut removed = 0;
            for dir_entry in fs::read_dir(dir)? {
                let path = dir_entry?.path();
                if is_entry_file(&path) && should_purge(&path, now) {
                    remove_entry(&path)?;
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.blocking(|dir| {
            let mut count = 0;
            for dir_entry in fs::read_dir(dir)? {
                if is_entry_file(&dir_entry?.path()) {
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
    }
}
