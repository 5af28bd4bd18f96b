//! Trait contract tests for ScorerStore, ProfileStore and RunLedger.
//!
//! Each contract is an async fn over `&dyn EvalStore`, run against both the
//! in-memory fake and the SurrealDB store on `mem://`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use simpl_state::fakes::MemoryEvalStore;
use simpl_state::storage_traits::*;
use simpl_state::{StorageError, SurrealEvalStore};
use uuid::Uuid;

fn builtin(name: &str, metric: &str) -> NewScorer {
    NewScorer {
        name: name.to_string(),
        description: Some(format!("{metric} metric")),
        scorer_type: ScorerType::Builtin,
        configuration: json!({ "metric_name": metric }),
    }
}

fn new_run(profile_id: Uuid) -> NewEvalRun {
    NewEvalRun {
        profile_id,
        dataset_path: "/tmp/uploads/abc-data.csv".to_string(),
        eval_type: Some("chatbot".to_string()),
    }
}

/// Spread `created_at` so ordering assertions are stable.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

// ===========================================================================
// Contracts
// ===========================================================================

async fn scorer_crud_round_trip(store: &dyn EvalStore) {
    let created = store.create_scorer(builtin("tox", "toxicity")).await.unwrap();
    assert_eq!(created.scorer_type, ScorerType::Builtin);

    let fetched = store.get_scorer(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.name, "tox");
    assert_eq!(fetched.configuration, json!({"metric_name": "toxicity"}));

    let updated = store
        .update_scorer(
            created.id,
            ScorerPatch {
                name: Some("toxicity-v2".into()),
                description: Some(None),
                configuration: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "toxicity-v2");
    assert_eq!(updated.description, None);
    assert_eq!(updated.configuration, json!({"metric_name": "toxicity"}));
    assert!(updated.updated_at >= created.updated_at);

    let reread = store.get_scorer(created.id).await.unwrap();
    assert_eq!(reread.name, "toxicity-v2");
    assert_eq!(reread.description, None);

    let with_nulls = json!({
        "metric_name": "toxicity",
        "threshold": null,
        "nested": {"x": null, "tags": [null, 1]},
    });
    store
        .update_scorer(
            created.id,
            ScorerPatch {
                name: None,
                description: None,
                configuration: Some(with_nulls.clone()),
            },
        )
        .await
        .unwrap();
    let reread = store.get_scorer(created.id).await.unwrap();
    assert_eq!(reread.configuration, with_nulls);

    store.delete_scorer(created.id).await.unwrap();
    let err = store.get_scorer(created.id).await.unwrap_err();
    assert!(matches!(err, StorageError::ScorerNotFound { .. }));
}

async fn scorer_unknown_type_survives_storage(store: &dyn EvalStore) {
    let created = store
        .create_scorer(NewScorer {
            name: "odd".into(),
            description: None,
            scorer_type: ScorerType::Unknown("regex".into()),
            configuration: json!({}),
        })
        .await
        .unwrap();
    let fetched = store.get_scorer(created.id).await.unwrap();
    assert_eq!(fetched.scorer_type, ScorerType::Unknown("regex".into()));
}

async fn scorers_listed_oldest_first(store: &dyn EvalStore) {
    let a = store.create_scorer(builtin("a", "toxicity")).await.unwrap();
    tick().await;
    let b = store.create_scorer(builtin("b", "token_count")).await.unwrap();

    let ids: Vec<Uuid> = store
        .list_scorers()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

async fn missing_records_report_not_found(store: &dyn EvalStore) {
    let id = Uuid::new_v4();
    assert!(matches!(
        store.update_scorer(id, ScorerPatch::default()).await,
        Err(StorageError::ScorerNotFound { .. })
    ));
    assert!(matches!(
        store.delete_scorer(id).await,
        Err(StorageError::ScorerNotFound { .. })
    ));
    assert!(matches!(
        store.get_profile(id).await,
        Err(StorageError::ProfileNotFound { .. })
    ));
    assert!(matches!(
        store.delete_profile(id).await,
        Err(StorageError::ProfileNotFound { .. })
    ));
    assert!(matches!(
        store.get_run(id).await,
        Err(StorageError::RunNotFound { .. })
    ));
    assert!(matches!(
        store.delete_run(id).await,
        Err(StorageError::RunNotFound { .. })
    ));
    assert!(matches!(
        store.mark_processing(id).await,
        Err(StorageError::RunNotFound { .. })
    ));
}

async fn profile_keeps_dangling_scorer_ids(store: &dyn EvalStore) {
    let scorer = store.create_scorer(builtin("tox", "toxicity")).await.unwrap();
    let ghost = Uuid::new_v4();
    let profile = store
        .create_profile(NewProfile {
            name: "suite".into(),
            description: None,
            scorer_ids: vec![scorer.id, ghost],
        })
        .await
        .unwrap();

    store.delete_scorer(scorer.id).await.unwrap();

    let fetched = store.get_profile(profile.id).await.unwrap();
    assert_eq!(fetched.scorer_ids, vec![scorer.id, ghost]);

    let patched = store
        .update_profile(
            profile.id,
            ProfilePatch {
                scorer_ids: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(patched.scorer_ids.is_empty());
    assert_eq!(patched.name, "suite");
}

async fn run_happy_path(store: &dyn EvalStore) {
    let profile_id = Uuid::new_v4();
    let run = store.create_run(new_run(profile_id)).await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert!(run.summary_results.is_none());

    let processing = store.mark_processing(run.id).await.unwrap();
    assert_eq!(processing.status, RunStatus::Processing);

    store.attach_engine_run(run.id, "engine-123").await.unwrap();

    let mut summary = BTreeMap::new();
    summary.insert("toxicity/mean".to_string(), 0.25);
    let done = store
        .complete_run(
            run.id,
            RunCompletion {
                summary_results: summary.clone(),
                row_details_path: Some("/tmp/artifacts/engine-123/rows.json".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, RunStatus::Completed);

    let fetched = store.get_run(run.id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::Completed);
    assert_eq!(fetched.engine_run_id.as_deref(), Some("engine-123"));
    assert_eq!(fetched.summary_results, Some(summary));
    assert!(fetched.error_message.is_none());
}

async fn run_failure_records_message(store: &dyn EvalStore) {
    let run = store.create_run(new_run(Uuid::new_v4())).await.unwrap();
    store.mark_processing(run.id).await.unwrap();
    store
        .fail_run(run.id, "No valid scorers found for this profile")
        .await
        .unwrap();

    let fetched = store.get_run(run.id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::Failed);
    assert_eq!(
        fetched.error_message.as_deref(),
        Some("No valid scorers found for this profile")
    );
    assert!(fetched.summary_results.is_none());
}

async fn illegal_transitions_leave_run_untouched(store: &dyn EvalStore) {
    let run = store.create_run(new_run(Uuid::new_v4())).await.unwrap();

    let err = store
        .complete_run(run.id, RunCompletion::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));
    assert!(matches!(
        store.attach_engine_run(run.id, "early").await,
        Err(StorageError::InvalidRunState { .. })
    ));

    store.mark_processing(run.id).await.unwrap();
    assert!(matches!(
        store.mark_processing(run.id).await,
        Err(StorageError::InvalidRunState { .. })
    ));

    store.fail_run(run.id, "boom").await.unwrap();
    assert!(matches!(
        store.complete_run(run.id, RunCompletion::default()).await,
        Err(StorageError::InvalidRunState { .. })
    ));
    assert!(matches!(
        store.fail_run(run.id, "again").await,
        Err(StorageError::InvalidRunState { .. })
    ));

    let fetched = store.get_run(run.id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::Failed);
    assert_eq!(fetched.error_message.as_deref(), Some("boom"));
    assert!(fetched.engine_run_id.is_none());
}

async fn runs_listed_newest_first_and_filtered(store: &dyn EvalStore) {
    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    let first = store.create_run(new_run(p1)).await.unwrap();
    tick().await;
    let other = store.create_run(new_run(p2)).await.unwrap();
    tick().await;
    let second = store.create_run(new_run(p1)).await.unwrap();

    let all: Vec<Uuid> = store
        .list_runs(None)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(all, vec![second.id, other.id, first.id]);

    let only_p1: Vec<Uuid> = store
        .list_runs(Some(p1))
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(only_p1, vec![second.id, first.id]);

    assert!(store
        .list_runs(Some(Uuid::new_v4()))
        .await
        .unwrap()
        .is_empty());
}

async fn delete_run_in_any_status(store: &dyn EvalStore) {
    let run = store.create_run(new_run(Uuid::new_v4())).await.unwrap();
    store.mark_processing(run.id).await.unwrap();
    store.delete_run(run.id).await.unwrap();

    assert!(matches!(
        store.fail_run(run.id, "late").await,
        Err(StorageError::RunNotFound { .. })
    ));
}

// ===========================================================================
// Backends
// ===========================================================================

macro_rules! contract_suite {
    (@tests $make:expr; $($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let store = $make;
                super::$name(&store).await;
            }
        )*
    };
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            contract_suite!(@tests $make;
                scorer_crud_round_trip,
                scorer_unknown_type_survives_storage,
                scorers_listed_oldest_first,
                missing_records_report_not_found,
                profile_keeps_dangling_scorer_ids,
                run_happy_path,
                run_failure_records_message,
                illegal_transitions_leave_run_untouched,
                runs_listed_newest_first_and_filtered,
                delete_run_in_any_status,
            );
        }
    };
}

contract_suite!(memory, MemoryEvalStore::new());
contract_suite!(
    surreal,
    SurrealEvalStore::in_memory()
        .await
        .expect("in_memory() failed")
);
