//! SurrealDB-backed implementation of the storage traits
//!
//! Uses the row types in `schema` for persistence, converting to and from
//! `storage_traits` records at the boundary. Run transitions are checked on
//! the record before the row is rewritten.

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::handle::{self, DbTarget};
use crate::schema::{EvalRunRow, ProfileRow, ScorerRow};
use crate::storage_traits::*;

/// SurrealDB-backed [`EvalStore`].
#[derive(Clone)]
pub struct SurrealEvalStore {
    db: Surreal<Any>,
}

impl SurrealEvalStore {
    /// Connect to `mem://` and run migrations. Used by tests.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&DbTarget::Memory).await
    }

    /// Connect using the environment chain, falling back to `local_dir`.
    ///
    /// See [`DbTarget::from_env`].
    pub async fn from_env(local_dir: Option<&Path>) -> crate::Result<Self> {
        Self::connect(&DbTarget::from_env(local_dir)).await
    }

    pub async fn connect(target: &DbTarget) -> crate::Result<Self> {
        let db = handle::connect(target).await?;
        info!("SurrealEvalStore ready");
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    /// Run a single-statement query binding `$key` and take the first result set.
    async fn select_where<T: DeserializeOwned + Send>(
        &self,
        sql: &'static str,
        key: &'static str,
        value: String,
    ) -> StorageResult<Vec<T>> {
        let mut res = self.db.query(sql).bind((key, value)).await?;
        let rows: Vec<T> = res.take(0)?;
        Ok(rows)
    }

    async fn select_all<T: DeserializeOwned + Send>(
        &self,
        sql: &'static str,
    ) -> StorageResult<Vec<T>> {
        let mut res = self.db.query(sql).await?;
        let rows: Vec<T> = res.take(0)?;
        Ok(rows)
    }

    async fn fetch_scorer(&self, id: Uuid) -> StorageResult<ScorerRecord> {
        let rows: Vec<ScorerRow> = self
            .select_where(
                "SELECT * FROM scorers WHERE scorer_id = $sid",
                "sid",
                id.to_string(),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::ScorerNotFound {
                scorer_id: id.to_string(),
            })?
            .try_into()
    }

    async fn fetch_profile(&self, id: Uuid) -> StorageResult<ProfileRecord> {
        let rows: Vec<ProfileRow> = self
            .select_where(
                "SELECT * FROM profiles WHERE profile_id = $pid",
                "pid",
                id.to_string(),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::ProfileNotFound {
                profile_id: id.to_string(),
            })?
            .try_into()
    }

    async fn fetch_run(&self, id: Uuid) -> StorageResult<EvalRunRecord> {
        let rows: Vec<EvalRunRow> = self
            .select_where(
                "SELECT * FROM eval_runs WHERE run_id = $rid",
                "rid",
                id.to_string(),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: id.to_string(),
            })?
            .try_into()
    }

    async fn write_run(&self, record: &EvalRunRecord) -> StorageResult<()> {
        self.db
            .query("UPDATE eval_runs CONTENT $row WHERE run_id = $rid")
            .bind(("row", EvalRunRow::from(record)))
            .bind(("rid", record.id.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    /// Load a run, apply `f` and persist it. Nothing is written if `f` fails.
    async fn update_run(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut EvalRunRecord) -> StorageResult<()> + Send,
    ) -> StorageResult<EvalRunRecord> {
        let mut run = self.fetch_run(id).await?;
        f(&mut run)?;
        self.write_run(&run).await?;
        Ok(run)
    }

    async fn delete_where(
        &self,
        sql: &'static str,
        key: &'static str,
        value: String,
    ) -> StorageResult<()> {
        self.db.query(sql).bind((key, value)).await?.check()?;
        Ok(())
    }
}

#[async_trait]
impl ScorerStore for SurrealEvalStore {
    async fn create_scorer(&self, new: NewScorer) -> StorageResult<ScorerRecord> {
        let record = ScorerRecord::new(new);
        debug!(scorer_id = %record.id, scorer_type = %record.scorer_type, "creating scorer");

        let _created: Option<ScorerRow> = self
            .db
            .create("scorers")
            .content(ScorerRow::from(&record))
            .await?;
        Ok(record)
    }

    async fn get_scorer(&self, id: Uuid) -> StorageResult<ScorerRecord> {
        self.fetch_scorer(id).await
    }

    async fn list_scorers(&self) -> StorageResult<Vec<ScorerRecord>> {
        let rows: Vec<ScorerRow> = self
            .select_all("SELECT * FROM scorers ORDER BY created_at ASC")
            .await?;
        rows.into_iter().map(ScorerRecord::try_from).collect()
    }

    async fn update_scorer(&self, id: Uuid, patch: ScorerPatch) -> StorageResult<ScorerRecord> {
        let mut record = self.fetch_scorer(id).await?;
        record.apply(patch);

        self.db
            .query("UPDATE scorers CONTENT $row WHERE scorer_id = $sid")
            .bind(("row", ScorerRow::from(&record)))
            .bind(("sid", id.to_string()))
            .await?
            .check()?;
        Ok(record)
    }

    async fn delete_scorer(&self, id: Uuid) -> StorageResult<()> {
        self.fetch_scorer(id).await?;
        self.delete_where(
            "DELETE scorers WHERE scorer_id = $sid",
            "sid",
            id.to_string(),
        )
        .await
    }
}

#[async_trait]
impl ProfileStore for SurrealEvalStore {
    async fn create_profile(&self, new: NewProfile) -> StorageResult<ProfileRecord> {
        let record = ProfileRecord::new(new);
        debug!(profile_id = %record.id, scorers = record.scorer_ids.len(), "creating profile");

        let _created: Option<ProfileRow> = self
            .db
            .create("profiles")
            .content(ProfileRow::from(&record))
            .await?;
        Ok(record)
    }

    async fn get_profile(&self, id: Uuid) -> StorageResult<ProfileRecord> {
        self.fetch_profile(id).await
    }

    async fn list_profiles(&self) -> StorageResult<Vec<ProfileRecord>> {
        let rows: Vec<ProfileRow> = self
            .select_all("SELECT * FROM profiles ORDER BY created_at ASC")
            .await?;
        rows.into_iter().map(ProfileRecord::try_from).collect()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        patch: ProfilePatch,
    ) -> StorageResult<ProfileRecord> {
        let mut record = self.fetch_profile(id).await?;
        record.apply(patch);

        self.db
            .query("UPDATE profiles CONTENT $row WHERE profile_id = $pid")
            .bind(("row", ProfileRow::from(&record)))
            .bind(("pid", id.to_string()))
            .await?
            .check()?;
        Ok(record)
    }

    async fn delete_profile(&self, id: Uuid) -> StorageResult<()> {
        self.fetch_profile(id).await?;
        self.delete_where(
            "DELETE profiles WHERE profile_id = $pid",
            "pid",
            id.to_string(),
        )
        .await
    }
}

#[async_trait]
impl RunLedger for SurrealEvalStore {
    async fn create_run(&self, new: NewEvalRun) -> StorageResult<EvalRunRecord> {
        let record = EvalRunRecord::new(new);
        debug!(run_id = %record.id, profile_id = %record.profile_id, "creating run");

        let _created: Option<EvalRunRow> = self
            .db
            .create("eval_runs")
            .content(EvalRunRow::from(&record))
            .await?;
        Ok(record)
    }

    async fn get_run(&self, id: Uuid) -> StorageResult<EvalRunRecord> {
        self.fetch_run(id).await
    }

    async fn list_runs(&self, profile_id: Option<Uuid>) -> StorageResult<Vec<EvalRunRecord>> {
        let rows: Vec<EvalRunRow> = match profile_id {
            Some(pid) => {
                self.select_where(
                    "SELECT * FROM eval_runs WHERE profile_id = $pid ORDER BY created_at DESC",
                    "pid",
                    pid.to_string(),
                )
                .await?
            }
            None => {
                self.select_all("SELECT * FROM eval_runs ORDER BY created_at DESC")
                    .await?
            }
        };
        rows.into_iter().map(EvalRunRecord::try_from).collect()
    }

    async fn delete_run(&self, id: Uuid) -> StorageResult<()> {
        self.fetch_run(id).await?;
        self.delete_where(
            "DELETE eval_runs WHERE run_id = $rid",
            "rid",
            id.to_string(),
        )
        .await
    }

    async fn mark_processing(&self, id: Uuid) -> StorageResult<EvalRunRecord> {
        self.update_run(id, |run| run.advance(RunStatus::Processing))
            .await
    }

    async fn attach_engine_run(&self, id: Uuid, engine_run_id: &str) -> StorageResult<()> {
        let engine_run_id = engine_run_id.to_string();
        self.update_run(id, move |run| {
            run.ensure_status(RunStatus::Processing)?;
            run.engine_run_id = Some(engine_run_id);
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn complete_run(
        &self,
        id: Uuid,
        completion: RunCompletion,
    ) -> StorageResult<EvalRunRecord> {
        self.update_run(id, move |run| run.complete(completion)).await
    }

    async fn fail_run(&self, id: Uuid, message: &str) -> StorageResult<EvalRunRecord> {
        let message = message.to_string();
        self.update_run(id, move |run| run.fail(&message)).await
    }
}
