//! Error taxonomy.
//!
//! Each concern gets its own enum; [`SearchError`] composes them with
//! `#[from]` so call sites can use `?` without manual wrapping. The variant
//! chosen at each call site doubles as the retry/skip policy for that error
//! (see the crate-level docs on [`SearchError::is_skip`]).

use crate::identity::{EntityId, RecordId, TenantId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy '{strategy}' is unavailable")]
    Unavailable { strategy: &'static str },

    #[error("strategy '{strategy}' operation failed: {reason}")]
    Operation { strategy: &'static str, reason: String },

    #[error("index not found for strategy '{strategy}'")]
    IndexNotFound { strategy: &'static str },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("record {record_id} for entity {entity_id} has an empty id and was dropped")]
    EmptyRecordId { entity_id: EntityId, record_id: RecordId },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value '{key}'")]
    MissingRequired { key: &'static str },

    #[error("invalid value for configuration key '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("reindex lock for tenant {tenant_id} is already held")]
    Conflict { tenant_id: TenantId },

    #[error("no reindex lock found for tenant {tenant_id}")]
    NotFound { tenant_id: TenantId },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to enqueue job on queue '{queue}': {reason}")]
    EnqueueFailed { queue: &'static str, reason: String },

    #[error("queue backend '{queue}' is unavailable")]
    BackendUnavailable { queue: &'static str },
}

/// Crate-wide error type. Every fallible operation in this workspace returns
/// `SearchResult<T>`.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl SearchError {
    /// Validation failures are skips, not hard failures: callers should log
    /// and move on rather than propagate or retry.
    pub fn is_skip(&self) -> bool {
        matches!(self, SearchError::Validation(_))
    }

    /// `IndexNotFound` is treated as an empty result / no-op by full-text
    /// strategy callers, never as an error condition.
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, SearchError::Strategy(StrategyError::IndexNotFound { .. }))
    }

    /// Whether a queue consumer should re-throw (causing a retry) rather
    /// than swallow the error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Strategy(StrategyError::Unavailable { .. })
                | SearchError::Strategy(StrategyError::Operation { .. })
                | SearchError::Queue(_)
        )
    }
}

pub type SearchResult<T> = Result<T, SearchError>;
