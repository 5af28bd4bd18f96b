//! In-memory fake for the storage traits (testing only)
//!
//! `MemoryEvalStore` satisfies `ScorerStore`, `ProfileStore` and `RunLedger`
//! without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory store backed by one `HashMap` per table.
#[derive(Debug, Default)]
pub struct MemoryEvalStore {
    scorers: Mutex<HashMap<Uuid, ScorerRecord>>,
    profiles: Mutex<HashMap<Uuid, ProfileRecord>>,
    runs: Mutex<HashMap<Uuid, EvalRunRecord>>,
}

impl MemoryEvalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_run<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut EvalRunRecord) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(&id).ok_or_else(|| StorageError::RunNotFound {
            run_id: id.to_string(),
        })?;
        // Work on a copy so a rejected transition leaves the stored row intact.
        let mut updated = run.clone();
        let out = f(&mut updated)?;
        *run = updated;
        Ok(out)
    }
}

#[async_trait]
impl ScorerStore for MemoryEvalStore {
    async fn create_scorer(&self, new: NewScorer) -> StorageResult<ScorerRecord> {
        let record = ScorerRecord::new(new);
        let mut scorers = self.scorers.lock().unwrap();
        scorers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_scorer(&self, id: Uuid) -> StorageResult<ScorerRecord> {
        let scorers = self.scorers.lock().unwrap();
        scorers
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::ScorerNotFound {
                scorer_id: id.to_string(),
            })
    }

    async fn list_scorers(&self) -> StorageResult<Vec<ScorerRecord>> {
        let scorers = self.scorers.lock().unwrap();
        let mut out: Vec<ScorerRecord> = scorers.values().cloned().collect();
        out.sort_by_key(|s| s.created_at);
        Ok(out)
    }

    async fn update_scorer(&self, id: Uuid, patch: ScorerPatch) -> StorageResult<ScorerRecord> {
        let mut scorers = self.scorers.lock().unwrap();
        let record = scorers
            .get_mut(&id)
            .ok_or_else(|| StorageError::ScorerNotFound {
                scorer_id: id.to_string(),
            })?;
        record.apply(patch);
        Ok(record.clone())
    }

    async fn delete_scorer(&self, id: Uuid) -> StorageResult<()> {
        let mut scorers = self.scorers.lock().unwrap();
        scorers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::ScorerNotFound {
                scorer_id: id.to_string(),
            })
    }
}

#[async_trait]
impl ProfileStore for MemoryEvalStore {
    async fn create_profile(&self, new: NewProfile) -> StorageResult<ProfileRecord> {
        let record = ProfileRecord::new(new);
        let mut profiles = self.profiles.lock().unwrap();
        profiles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_profile(&self, id: Uuid) -> StorageResult<ProfileRecord> {
        let profiles = self.profiles.lock().unwrap();
        profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::ProfileNotFound {
                profile_id: id.to_string(),
            })
    }

    async fn list_profiles(&self) -> StorageResult<Vec<ProfileRecord>> {
        let profiles = self.profiles.lock().unwrap();
        let mut out: Vec<ProfileRecord> = profiles.values().cloned().collect();
        out.sort_by_key(|p| p.created_at);
        Ok(out)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        patch: ProfilePatch,
    ) -> StorageResult<ProfileRecord> {
        let mut profiles = self.profiles.lock().unwrap();
        let record = profiles
            .get_mut(&id)
            .ok_or_else(|| StorageError::ProfileNotFound {
                profile_id: id.to_string(),
            })?;
        record.apply(patch);
        Ok(record.clone())
    }

    async fn delete_profile(&self, id: Uuid) -> StorageResult<()> {
        let mut profiles = self.profiles.lock().unwrap();
        profiles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::ProfileNotFound {
                profile_id: id.to_string(),
            })
    }
}

#[async_trait]
impl RunLedger for MemoryEvalStore {
    async fn create_run(&self, new: NewEvalRun) -> StorageResult<EvalRunRecord> {
        let record = EvalRunRecord::new(new);
        let mut runs = self.runs.lock().unwrap();
        runs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_run(&self, id: Uuid) -> StorageResult<EvalRunRecord> {
        let runs = self.runs.lock().unwrap();
        runs.get(&id)
            .cloned()
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: id.to_string(),
            })
    }

    async fn list_runs(&self, profile_id: Option<Uuid>) -> StorageResult<Vec<EvalRunRecord>> {
        let runs = self.runs.lock().unwrap();
        let mut out: Vec<EvalRunRecord> = runs
            .values()
            .filter(|r| profile_id.map_or(true, |p| r.profile_id == p))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn delete_run(&self, id: Uuid) -> StorageResult<()> {
        let mut runs = self.runs.lock().unwrap();
        runs.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: id.to_string(),
            })
    }

    async fn mark_processing(&self, id: Uuid) -> StorageResult<EvalRunRecord> {
        self.with_run(id, |run| {
            run.advance(RunStatus::Processing)?;
            Ok(run.clone())
        })
    }

    async fn attach_engine_run(&self, id: Uuid, engine_run_id: &str) -> StorageResult<()> {
        self.with_run(id, |run| {
            run.ensure_status(RunStatus::Processing)?;
            run.engine_run_id = Some(engine_run_id.to_string());
            Ok(())
        })
    }

    async fn complete_run(
        &self,
        id: Uuid,
        completion: RunCompletion,
    ) -> StorageResult<EvalRunRecord> {
        self.with_run(id, |run| {
            run.complete(completion)?;
            Ok(run.clone())
        })
    }

    async fn fail_run(&self, id: Uuid, message: &str) -> StorageResult<EvalRunRecord> {
        self.with_run(id, |run| {
            run.fail(message)?;
            Ok(run.clone())
        })
    }
}
