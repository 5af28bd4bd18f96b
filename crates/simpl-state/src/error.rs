//! Error types for simpl-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("scorer not found: {scorer_id}")]
    ScorerNotFound { scorer_id: String },

    #[error("profile not found: {profile_id}")]
    ProfileNotFound { profile_id: String },

    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// The requested status change is not a legal run transition.
    #[error("run {run_id} is {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    /// A stored row could not be mapped back into a record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for the three "no such record" variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ScorerNotFound { .. }
                | StorageError::ProfileNotFound { .. }
                | StorageError::RunNotFound { .. }
        )
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
