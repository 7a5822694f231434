pub mod config;
pub mod dedup;
pub mod error;
pub mod gate;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod scheduler;
pub mod state;
pub mod traits;
pub mod translate;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{HtmlSourceSpec, TidingsConfig};
pub use dedup::{Deduplicator, SeenStore};
pub use error::AppError;
pub use gate::RunGate;
pub use models::{
    CandidateItem, CycleOutcome, CycleReport, DedupKey, OutboundMessage, TranslationResult,
    compose_message, compute_hash,
};
pub use pipeline::{CycleEvent, CycleReporter, Pipeline, PipelineConfig, TracingCycleReporter};
pub use publish::PacedPublisher;
pub use scheduler::{Scheduler, SchedulerReporter, TracingSchedulerReporter};
pub use state::{JsonFileStore, MemoryStore};
pub use traits::{Clock, Publisher, SourceReader, StateStore, SystemClock, TranslationProvider};
pub use translate::TranslationChain;
