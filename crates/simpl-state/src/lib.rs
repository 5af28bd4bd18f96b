//! simpl-state: SurrealDB persistence for the evaluation service
//!
//! Stores scorer definitions, evaluation profiles and evaluation runs.
//!
//! ## Key Components
//!
//! - `storage_traits`: backend-agnostic `ScorerStore`, `ProfileStore` and
//!   `RunLedger` traits, plus the `EvalStore` umbrella
//! - `SurrealEvalStore`: SurrealDB implementation (memory, SurrealKV or remote)
//! - `fakes::MemoryEvalStore`: in-memory implementation for tests

mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{DbTarget, RemoteConfig};
pub use storage_traits::{
    EvalRunRecord, EvalStore, NewEvalRun, NewProfile, NewScorer, ProfilePatch, ProfileRecord,
    ProfileStore, RunCompletion, RunLedger, RunStatus, ScorerPatch, ScorerRecord, ScorerStore,
    ScorerType, StorageResult,
};
pub use surreal_store::SurrealEvalStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
