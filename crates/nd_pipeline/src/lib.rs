pub mod gate;
pub mod notify;
pub mod orchestrator;
pub mod render;
pub mod scheduler;
pub mod selection;

pub use gate::{ConcurrencyGate, GateGuard, GateHolder, GateTicket};
pub use notify::ResendNotifier;
pub use orchestrator::{
    Collaborators, EnrichmentStats, FaultKind, PipelineOrchestrator, PipelineRun, RunStatus, Stage, StageError,
};
pub use render::TemplateRenderer;
pub use scheduler::{HumanDuration, ScheduleSpec, Scheduler};
pub use selection::{resolve_selection, RunSelection};

pub mod prelude {
    pub use super::{
        Collaborators, ConcurrencyGate, PipelineOrchestrator, PipelineRun, RunStatus, ScheduleSpec, Scheduler,
        TemplateRenderer,
    };
    pub use nd_core::{Error, Result, TriggerKind};
}
