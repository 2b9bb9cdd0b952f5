//! Error types for each layer of the timer subsystem

use thiserror::Error;

/// Failures writing the local timer state file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on timer state file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode timer state: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("timer state lock poisoned: {0}")]
    Poisoned(String),
}

/// Failures of the countdown state machine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no countdown is running")]
    NotRunning,
    #[error("a countdown is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures talking to the remote timer history backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("no timer record for user {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("authorization rejected: {0}")]
    Auth(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RepositoryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            RepositoryError::Decode(error.to_string())
        } else {
            RepositoryError::Network(error.to_string())
        }
    }
}

/// Errors surfaced by the controller to its callers.
///
/// Local failures (`Engine`) and remote failures (`Remote`) stay distinct so the
/// caller can tell a broken device store from an unreachable backend.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Remote(#[from] RepositoryError),
}

impl ControllerError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ControllerError::Engine(EngineError::NotRunning))
    }

    pub fn is_already_running(&self) -> bool {
        matches!(self, ControllerError::Engine(EngineError::AlreadyRunning))
    }
}
