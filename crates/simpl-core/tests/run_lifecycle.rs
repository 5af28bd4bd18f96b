//! End-to-end run lifecycle: stores, local engine, orchestrator and reports.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use simpl_core::{
    run_rows, EvalError, LocalEngine, OpenAiJudgeClient, RunOrchestrator, TriggerRequest,
};
use simpl_state::fakes::MemoryEvalStore;
use simpl_state::{
    EvalRunRecord, EvalStore, NewProfile, NewScorer, RunStatus, ScorerType, SurrealEvalStore,
};
use uuid::Uuid;

struct Harness {
    store: Arc<dyn EvalStore>,
    orchestrator: RunOrchestrator,
    _artifacts: tempfile::TempDir,
    uploads: tempfile::TempDir,
}

impl Harness {
    fn new(store: Arc<dyn EvalStore>) -> Self {
        let artifacts = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(artifacts.path(), Arc::new(OpenAiJudgeClient::default()));
        let orchestrator = RunOrchestrator::new(store.clone(), Arc::new(engine));
        Self {
            store,
            orchestrator,
            _artifacts: artifacts,
            uploads: tempfile::tempdir().unwrap(),
        }
    }

    fn dataset(&self, name: &str, body: &str) -> String {
        let path = self.uploads.path().join(name);
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    async fn builtin(&self, metric: &str) -> Uuid {
        self.store
            .create_scorer(NewScorer {
                name: metric.to_string(),
                description: None,
                scorer_type: ScorerType::Builtin,
                configuration: json!({ "metric_name": metric }),
            })
            .await
            .unwrap()
            .id
    }

    async fn profile(&self, scorer_ids: Vec<Uuid>) -> Uuid {
        self.store
            .create_profile(NewProfile {
                name: "quality".into(),
                description: Some("nightly checks".into()),
                scorer_ids,
            })
            .await
            .unwrap()
            .id
    }

    async fn trigger(&self, profile_id: Uuid, dataset: String) -> EvalRunRecord {
        self.orchestrator
            .trigger(TriggerRequest {
                profile_id,
                dataset_id: dataset,
                eval_type: None,
            })
            .await
            .unwrap()
    }

    async fn wait_terminal(&self, run_id: Uuid) -> EvalRunRecord {
        for _ in 0..500 {
            let run = self.store.get_run(run_id).await.unwrap();
            if run.status.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} never reached a terminal state");
    }
}

const TWO_ROWS: &str = "inputs,outputs\nSay hello,Hello there\nSay bye,Goodbye friend\n";

async fn toxicity_run_completes_with_rows(store: Arc<dyn EvalStore>) {
    let h = Harness::new(store);
    let tox = h.builtin("toxicity").await;
    let pid = h.profile(vec![tox]).await;
    let dataset = h.dataset("two.csv", TWO_ROWS);

    let run = h.trigger(pid, dataset).await;
    assert_eq!(run.status, RunStatus::Pending);

    let run = h.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Completed, "{:?}", run.error_message);
    assert!(run.error_message.is_none());
    assert!(run.engine_run_id.is_some());

    let summary = run.summary_results.clone().unwrap();
    assert!(summary.keys().any(|k| k.starts_with("toxicity/")));
    assert_eq!(summary["toxicity/mean"], 0.0);

    let row_path = run.row_details_path.clone().unwrap();
    assert!(Path::new(&row_path).is_file());

    let page = run_rows(h.store.as_ref(), run.id, 1, 50).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!((page.total, page.page, page.pages), (2, 1, 1));
    assert_eq!(page.items[0]["inputs"], "Say hello");
    assert_eq!(page.items[1]["toxicity/score"], 0.0);
}

#[tokio::test]
async fn toxicity_run_completes_in_memory() {
    toxicity_run_completes_with_rows(Arc::new(MemoryEvalStore::new())).await;
}

#[tokio::test]
async fn toxicity_run_completes_on_surreal() {
    let store = SurrealEvalStore::in_memory().await.unwrap();
    toxicity_run_completes_with_rows(Arc::new(store)).await;
}

#[tokio::test]
async fn unknown_profile_is_rejected_without_a_run() {
    let h = Harness::new(Arc::new(MemoryEvalStore::new()));
    let dataset = h.dataset("two.csv", TWO_ROWS);

    let err = h
        .orchestrator
        .trigger(TriggerRequest {
            profile_id: Uuid::new_v4(),
            dataset_id: dataset,
            eval_type: Some("rag".into()),
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, EvalError::ProfileNotFound(_)));
    assert!(h.store.list_runs(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_the_only_scorer_fails_later_runs() {
    let h = Harness::new(Arc::new(MemoryEvalStore::new()));
    let tox = h.builtin("toxicity").await;
    let pid = h.profile(vec![tox]).await;
    h.store.delete_scorer(tox).await.unwrap();

    // The profile itself survives the scorer's deletion.
    assert_eq!(h.store.get_profile(pid).await.unwrap().scorer_ids, vec![tox]);

    let run = h.trigger(pid, h.dataset("two.csv", TWO_ROWS)).await;
    let run = h.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("No valid scorers found for this profile")
    );
    assert!(run.summary_results.is_none());
    assert!(run.row_details_path.is_none());

    let page = run_rows(h.store.as_ref(), run.id, 1, 50).await.unwrap();
    assert_eq!((page.total, page.pages), (0, 0));
}

#[tokio::test]
async fn deleting_one_of_two_scorers_skips_it() {
    let h = Harness::new(Arc::new(MemoryEvalStore::new()));
    let tox = h.builtin("toxicity").await;
    let tokens = h.builtin("token_count").await;
    let pid = h.profile(vec![tox, tokens]).await;
    h.store.delete_scorer(tox).await.unwrap();

    let run = h.trigger(pid, h.dataset("two.csv", TWO_ROWS)).await;
    let run = h.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Completed);

    let summary = run.summary_results.unwrap();
    assert_eq!(summary["token_count/mean"], 2.0);
    assert!(!summary.keys().any(|k| k.starts_with("toxicity/")));
}

#[tokio::test]
async fn unknown_builtin_fails_at_run_time() {
    let h = Harness::new(Arc::new(MemoryEvalStore::new()));
    let bleu = h.builtin("bleu").await;
    let pid = h.profile(vec![bleu]).await;

    let run = h.trigger(pid, h.dataset("two.csv", TWO_ROWS)).await;
    let run = h.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("unknown built-in metric: bleu")
    );
    assert!(run.engine_run_id.is_some());
}

#[tokio::test]
async fn code_scorers_fail_the_run() {
    let h = Harness::new(Arc::new(MemoryEvalStore::new()));
    let code = h
        .store
        .create_scorer(NewScorer {
            name: "custom".into(),
            description: None,
            scorer_type: ScorerType::Code,
            configuration: json!({ "source": "def score(row): return 1" }),
        })
        .await
        .unwrap();
    let pid = h.profile(vec![code.id]).await;

    let run = h.trigger(pid, h.dataset("two.csv", TWO_ROWS)).await;
    let run = h.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("Code-based scorers are not yet implemented")
    );
    assert!(run.engine_run_id.is_none());
}

#[tokio::test]
async fn runs_list_newest_first_per_profile() {
    let h = Harness::new(Arc::new(MemoryEvalStore::new()));
    let tox = h.builtin("toxicity").await;
    let a = h.profile(vec![tox]).await;
    let b = h.profile(vec![tox]).await;

    let first = h.trigger(a, h.dataset("one.csv", TWO_ROWS)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.trigger(a, h.dataset("one.csv", TWO_ROWS)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let other = h.trigger(b, h.dataset("one.csv", TWO_ROWS)).await;

    for id in [first.id, second.id, other.id] {
        h.wait_terminal(id).await;
    }

    let ids: Vec<Uuid> = h
        .store
        .list_runs(Some(a))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(h.store.list_runs(None).await.unwrap().len(), 3);
}
