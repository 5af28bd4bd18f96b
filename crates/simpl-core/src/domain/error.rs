//! Domain-level error taxonomy for the evaluation service.

use simpl_state::StorageError;
use uuid::Uuid;

use crate::dataset::DatasetError;
use crate::engine::EngineError;
use crate::report::ReportError;
use crate::resolver::ScorerError;

/// Evaluation service errors.
///
/// `NotFound`-style variants and dataset validation surface synchronously to
/// callers. Failures inside a background run are recorded on the run instead.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("Run {0} not found")]
    RunNotFound(Uuid),

    #[error("Dataset not found at {0}")]
    DatasetNotFound(String),

    #[error("No valid scorers found for this profile")]
    NoValidScorers,

    /// Two scorers in one profile would write the same result columns.
    #[error("Duplicate metric name in profile: {0}")]
    DuplicateMetric(String),

    #[error("evaluation panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// True when the error means a referenced record or file is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            EvalError::ProfileNotFound(_)
            | EvalError::RunNotFound(_)
            | EvalError::DatasetNotFound(_) => true,
            EvalError::Storage(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for evaluation domain operations.
pub type Result<T> = std::result::Result<T, EvalError>;
