use std::path::PathBuf;
use std::sync::Arc;

use simpl_core::{EvaluationEngine, RunOrchestrator};
use simpl_state::EvalStore;

use crate::ttl_cache::RateLimiter;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EvalStore>,
    pub orchestrator: RunOrchestrator,
    pub upload_dir: Arc<PathBuf>,
    pub limiter: Arc<RateLimiter>,
    /// Whether `X-Forwarded-For` identifies the client.
    pub trust_forwarded: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EvalStore>,
        engine: Arc<dyn EvaluationEngine>,
        upload_dir: PathBuf,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            orchestrator: RunOrchestrator::new(store.clone(), engine),
            store,
            upload_dir: Arc::new(upload_dir),
            limiter: Arc::new(limiter),
            trust_forwarded: false,
        }
    }

    /// Key rate limits on `X-Forwarded-For` instead of the peer address.
    pub fn trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }
}
