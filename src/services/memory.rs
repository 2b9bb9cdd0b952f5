//! In-process timer history, for offline runs and tests

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use async_trait::async_trait;

use crate::error::RepositoryError;
use super::history::{TimerHistoryRepository, TimerRecord};

/// Keeps records in a map keyed by uid. Can be told to fail every call.
#[derive(Debug, Default)]
pub struct InMemoryTimerHistoryRepository {
    records: Mutex<HashMap<String, TimerRecord>>,
    failure: Mutex<Option<RepositoryError>>,
    calls: AtomicUsize,
}

impl InMemoryTimerHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call return `error` (or behave again with `None`)
    pub fn fail_with(&self, error: Option<RepositoryError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Number of repository calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Seed a record without counting it as a call
    pub fn insert(&self, record: TimerRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.uid.clone(), record);
        }
    }

    fn begin_call(&self) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .map_err(|e| RepositoryError::Network(format!("in-memory lock poisoned: {e}")))?;
        match failure.as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, TimerRecord>) -> T,
    ) -> Result<T, RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| RepositoryError::Network(format!("in-memory lock poisoned: {e}")))?;
        Ok(f(&mut records))
    }
}

#[async_trait]
impl TimerHistoryRepository for InMemoryTimerHistoryRepository {
    async fn get_timer(&self, uid: &str) -> Result<TimerRecord, RepositoryError> {
        self.begin_call()?;
        self.with_records(|records| records.get(uid).cloned())?
            .ok_or_else(|| RepositoryError::NotFound(uid.to_string()))
    }

    async fn upsert_timer(&self, record: &TimerRecord) -> Result<TimerRecord, RepositoryError> {
        self.begin_call()?;
        self.with_records(|records| {
            records.insert(record.uid.clone(), record.clone());
        })?;
        Ok(record.clone())
    }

    async fn get_timers_of_user(&self, uid: &str) -> Result<Vec<TimerRecord>, RepositoryError> {
        self.begin_call()?;
        self.with_records(|records| records.get(uid).cloned().into_iter().collect())
    }

    async fn delete_timer(&self, uid: &str) -> Result<(), RepositoryError> {
        self.begin_call()?;
        self.with_records(|records| {
            records.remove(uid);
        })
    }
}
