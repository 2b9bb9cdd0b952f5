//! Durable local store for the countdown record

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::StoreError;
use super::TimerState;

/// File-backed timer state.
///
/// The whole record lives in one JSON document that is rewritten atomically
/// (temp file, fsync, rename) on every change, so a crash leaves either the
/// old record or the new one on disk. The in-memory copy mirrors the last
/// successful write.
///
/// Writers serialize on `write_lock` for the whole write, including the fsync.
/// `state` is only locked to copy or swap the record, so readers such as the
/// ticker never wait on disk I/O.
#[derive(Debug)]
pub struct TimerStateStore {
    path: PathBuf,
    state: Mutex<TimerState>,
    write_lock: Mutex<()>,
}

impl TimerStateStore {
    /// Open the store at `path`, loading whatever was persisted there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load(&path);
        Self {
            path,
            state: Mutex::new(state),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the persisted record. Never fails: a missing, unreadable or
    /// inconsistent file reads as the idle record.
    pub fn load(path: &Path) -> TimerState {
        let document = match fs::read_to_string(path) {
            Ok(document) => document,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No timer state at {}, starting idle", path.display());
                return TimerState::idle();
            }
            Err(e) => {
                warn!("Failed to read timer state {}: {}", path.display(), e);
                return TimerState::idle();
            }
        };

        let state = TimerState::from_json_lenient(&document);
        if !state.is_consistent() {
            warn!("Discarding inconsistent timer state from {}: {:?}", path.display(), state);
            return TimerState::idle();
        }

        debug!("Loaded timer state: counting={}", state.counting);
        state
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current record
    pub fn snapshot(&self) -> TimerState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_counting(&self) -> bool {
        self.snapshot().counting
    }

    /// `max(0, deadline - now)`, zero when idle
    pub fn remaining_time(&self, now: DateTime<Utc>) -> Duration {
        self.snapshot().remaining(now)
    }

    /// Persist all three fields in one atomic write
    pub fn replace(&self, next: TimerState) -> Result<(), StoreError> {
        self.update(|state| *state = next)
    }

    pub fn set_start(&self, start: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        self.update(|state| state.start = start)
    }

    pub fn set_deadline(&self, deadline: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        self.update(|state| state.deadline = deadline)
    }

    pub fn set_counting(&self, counting: bool) -> Result<(), StoreError> {
        self.update(|state| state.counting = counting)
    }

    /// Apply `updater` to a copy, write it, and only then adopt it in memory.
    fn update<F>(&self, updater: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut TimerState),
    {
        let _writing = self.write_lock.lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let mut next = self.snapshot();
        updater(&mut next);

        let document = next.to_json()?;
        write_atomically(&self.path, document.as_bytes())?;

        let mut state = self.state.lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        *state = next;
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)
}
