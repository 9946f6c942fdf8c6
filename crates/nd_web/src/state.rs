use std::sync::Arc;

use nd_core::NewsletterStore;
use nd_pipeline::{ConcurrencyGate, PipelineOrchestrator, Scheduler};

pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub scheduler: Option<Arc<Scheduler>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, scheduler: Option<Arc<Scheduler>>) -> Self {
        Self {
            orchestrator,
            scheduler,
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        self.orchestrator.gate()
    }

    pub fn store(&self) -> &Arc<dyn NewsletterStore> {
        self.orchestrator.store()
    }
}
