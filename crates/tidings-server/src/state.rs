use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tidings_core::error::AppError;
use tidings_core::models::CycleReport;
use tidings_core::pipeline::Pipeline;
use tidings_core::traits::{Clock, Publisher, StateStore};

/// Something that can run one relay cycle on demand.
#[async_trait]
pub trait CycleTrigger: Send + Sync {
    async fn trigger(&self) -> Result<CycleReport, AppError>;
}

/// A pipeline shared between the HTTP trigger and, optionally, the scheduler.
pub struct SharedPipeline<S, P, C>
where
    S: StateStore + Clone,
    P: Publisher,
    C: Clock,
{
    pipeline: Arc<Mutex<Pipeline<S, P, C>>>,
}

impl<S, P, C> SharedPipeline<S, P, C>
where
    S: StateStore + Clone,
    P: Publisher,
    C: Clock,
{
    pub fn new(pipeline: Arc<Mutex<Pipeline<S, P, C>>>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl<S, P, C> CycleTrigger for SharedPipeline<S, P, C>
where
    S: StateStore + Clone + 'static,
    P: Publisher + 'static,
    C: Clock + 'static,
{
    /// Waits for any cycle already in progress, then runs one. The cycle
    /// runs on its own task so a panic surfaces as an error response.
    async fn trigger(&self) -> Result<CycleReport, AppError> {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move { pipeline.lock().await.run_once().await })
            .await
            .map_err(|e| AppError::Generic(format!("Cycle task failed: {e}")))
    }
}

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// `Err` holds the reason the pipeline could not be assembled (e.g.
    /// missing bot credentials); `/run` reports it.
    pub trigger: Result<Arc<dyn CycleTrigger>, String>,
}

impl AppState {
    pub fn new(trigger: Arc<dyn CycleTrigger>) -> Self {
        Self {
            trigger: Ok(trigger),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            trigger: Err(reason.into()),
        }
    }
}
