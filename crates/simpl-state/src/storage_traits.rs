//! Storage trait definitions for the evaluation service
//!
//! These traits define the persistence seams:
//! - `ScorerStore`: scorer definitions (CRUD)
//! - `ProfileStore`: evaluation profiles (CRUD)
//! - `RunLedger`: evaluation runs and their status transitions
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Lets a patch field distinguish "absent" (`None`) from "explicit null"
/// (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Scorers
// ---------------------------------------------------------------------------

/// Kind of scorer. Serialized as its lowercase name.
///
/// Values outside the known set are kept as `Unknown` so that a stored
/// record with an unrecognised kind can still be loaded and reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScorerType {
    /// Reference to a metric the evaluation engine ships with.
    Builtin,
    /// Metric graded by a judge model from a natural-language rubric.
    LlmJudge,
    /// User-supplied code. Rejected at resolution time.
    Code,
    Unknown(String),
}

impl ScorerType {
    pub fn as_str(&self) -> &str {
        match self {
            ScorerType::Builtin => "builtin",
            ScorerType::LlmJudge => "llm_judge",
            ScorerType::Code => "code",
            ScorerType::Unknown(other) => other,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ScorerType::Unknown(_))
    }
}

impl From<String> for ScorerType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "builtin" => ScorerType::Builtin,
            "llm_judge" => ScorerType::LlmJudge,
            "code" => ScorerType::Code,
            _ => ScorerType::Unknown(value),
        }
    }
}

impl From<ScorerType> for String {
    fn from(value: ScorerType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ScorerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored scorer definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scorer_type: ScorerType,
    /// Opaque, kind-specific configuration object.
    pub configuration: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScorer {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scorer_type: ScorerType,
    pub configuration: serde_json::Value,
}

/// Partial update for a scorer. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub configuration: Option<serde_json::Value>,
}

impl ScorerRecord {
    pub fn new(new: NewScorer) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            scorer_type: new.scorer_type,
            configuration: new.configuration,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: ScorerPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(configuration) = patch.configuration {
            self.configuration = configuration;
        }
        self.updated_at = Utc::now();
    }
}

/// Scorer definition registry.
#[async_trait]
pub trait ScorerStore: Send + Sync {
    async fn create_scorer(&self, new: NewScorer) -> StorageResult<ScorerRecord>;

    /// Returns `StorageError::ScorerNotFound` if absent.
    async fn get_scorer(&self, id: Uuid) -> StorageResult<ScorerRecord>;

    /// All scorers, oldest first.
    async fn list_scorers(&self) -> StorageResult<Vec<ScorerRecord>>;

    async fn update_scorer(&self, id: Uuid, patch: ScorerPatch) -> StorageResult<ScorerRecord>;

    /// Deletes the scorer only. Profiles that reference it are untouched.
    async fn delete_scorer(&self, id: Uuid) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A named, reusable bundle of scorer references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scorer_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scorer_ids: Vec<Uuid>,
}

/// Partial update for a profile. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub scorer_ids: Option<Vec<Uuid>>,
}

impl ProfileRecord {
    pub fn new(new: NewProfile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            scorer_ids: new.scorer_ids,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(scorer_ids) = patch.scorer_ids {
            self.scorer_ids = scorer_ids;
        }
        self.updated_at = Utc::now();
    }
}

/// Profile registry. Scorer references are not validated on write.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, new: NewProfile) -> StorageResult<ProfileRecord>;

    /// Returns `StorageError::ProfileNotFound` if absent.
    async fn get_profile(&self, id: Uuid) -> StorageResult<ProfileRecord>;

    /// All profiles, oldest first.
    async fn list_profiles(&self) -> StorageResult<Vec<ProfileRecord>>;

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch)
        -> StorageResult<ProfileRecord>;

    async fn delete_profile(&self, id: Uuid) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// Status of an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Processing => "PROCESSING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// The only legal moves are PENDING → PROCESSING → COMPLETED | FAILED.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Processing)
                | (RunStatus::Processing, RunStatus::Completed)
                | (RunStatus::Processing, RunStatus::Failed)
        )
    }

    /// The status a run must be in to move to `self`.
    fn required_predecessor(self) -> &'static str {
        match self {
            RunStatus::Pending => "nothing (runs are created PENDING)",
            RunStatus::Processing => "PENDING",
            RunStatus::Completed | RunStatus::Failed => "PROCESSING",
        }
    }
}

impl FromStr for RunStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RunStatus::Pending),
            "PROCESSING" => Ok(RunStatus::Processing),
            "COMPLETED" => Ok(RunStatus::Completed),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(StorageError::Corrupt(format!("unknown run status: {other}"))),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of a profile's scorers against one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRunRecord {
    pub id: Uuid,
    pub profile_id: Uuid,
    /// Filesystem path of the uploaded dataset.
    pub dataset_path: String,
    /// Evaluation flavour hint supplied at trigger time.
    pub eval_type: Option<String>,
    /// Identifier of the engine-side run, set once processing starts.
    pub engine_run_id: Option<String>,
    pub status: RunStatus,
    /// Aggregate metrics. Only set on COMPLETED runs.
    pub summary_results: Option<BTreeMap<String, f64>>,
    /// Local path of the row-level detail artifact. Only set on COMPLETED runs.
    pub row_details_path: Option<String>,
    /// Failure description. Only set on FAILED runs.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a run. Runs always start PENDING.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvalRun {
    pub profile_id: Uuid,
    pub dataset_path: String,
    #[serde(default)]
    pub eval_type: Option<String>,
}

/// Results recorded when a run completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCompletion {
    pub summary_results: BTreeMap<String, f64>,
    pub row_details_path: Option<String>,
}

impl EvalRunRecord {
    pub fn new(new: NewEvalRun) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile_id: new.profile_id,
            dataset_path: new.dataset_path,
            eval_type: new.eval_type,
            engine_run_id: None,
            status: RunStatus::Pending,
            summary_results: None,
            row_details_path: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting anything but a legal forward transition.
    pub fn advance(&mut self, next: RunStatus) -> StorageResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(StorageError::InvalidRunState {
                run_id: self.id.to_string(),
                status: self.status.to_string(),
                expected: next.required_predecessor().to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fail with `InvalidRunState` unless the run is currently `expected`.
    pub fn ensure_status(&self, expected: RunStatus) -> StorageResult<()> {
        if self.status != expected {
            return Err(StorageError::InvalidRunState {
                run_id: self.id.to_string(),
                status: self.status.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    pub fn complete(&mut self, completion: RunCompletion) -> StorageResult<()> {
        self.advance(RunStatus::Completed)?;
        self.summary_results = Some(completion.summary_results);
        self.row_details_path = completion.row_details_path;
        Ok(())
    }

    pub fn fail(&mut self, message: &str) -> StorageResult<()> {
        self.advance(RunStatus::Failed)?;
        self.error_message = Some(message.to_string());
        Ok(())
    }
}

/// Evaluation run ledger.
///
/// Guarantees:
/// - Runs are created PENDING.
/// - Status moves PENDING → PROCESSING → COMPLETED | FAILED and nowhere else.
/// - Terminal runs are immutable.
#[async_trait]
pub trait RunLedger: Send + Sync {
    async fn create_run(&self, new: NewEvalRun) -> StorageResult<EvalRunRecord>;

    /// Returns `StorageError::RunNotFound` if absent.
    async fn get_run(&self, id: Uuid) -> StorageResult<EvalRunRecord>;

    /// List runs newest first, optionally only those for one profile.
    async fn list_runs(&self, profile_id: Option<Uuid>) -> StorageResult<Vec<EvalRunRecord>>;

    /// Delete regardless of status. There is no cancellation.
    async fn delete_run(&self, id: Uuid) -> StorageResult<()>;

    /// PENDING → PROCESSING.
    async fn mark_processing(&self, id: Uuid) -> StorageResult<EvalRunRecord>;

    /// Record the engine-side run id. Only valid while PROCESSING.
    async fn attach_engine_run(&self, id: Uuid, engine_run_id: &str) -> StorageResult<()>;

    /// PROCESSING → COMPLETED with results.
    async fn complete_run(&self, id: Uuid, completion: RunCompletion)
        -> StorageResult<EvalRunRecord>;

    /// PROCESSING → FAILED with an error message.
    async fn fail_run(&self, id: Uuid, message: &str) -> StorageResult<EvalRunRecord>;
}

/// Everything the evaluation service needs from persistence.
pub trait EvalStore: ScorerStore + ProfileStore + RunLedger {}

impl<T> EvalStore for T where T: ScorerStore + ProfileStore + RunLedger + ?Sized {}
