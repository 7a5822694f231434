use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::Mutex;

use tidings_core::error::AppError;
use tidings_core::models::CycleReport;
use tidings_core::pipeline::{Pipeline, PipelineConfig};
use tidings_core::state::MemoryStore;
use tidings_core::testutil::{MockClock, MockPublisher, MockSource, MockTranslator, item};
use tidings_core::translate::TranslationChain;
use tidings_server::routes;
use tidings_server::state::{AppState, CycleTrigger, SharedPipeline};

pub struct TestApp {
    pub router: Router,
    pub publisher: MockPublisher,
    pub clock: MockClock,
}

/// Router over an in-memory pipeline with two fresh items from one source.
pub fn setup_test_app() -> TestApp {
    let source = MockSource::new(
        "markets",
        vec![
            item("Stocks rally", "https://news.example.com/1"),
            item("Bonds slip", "https://news.example.com/2"),
        ],
    );
    let translator = TranslationChain::new("en", "uk")
        .with_provider(MockTranslator::prefixing("mock", "UK: "));
    let publisher = MockPublisher::new();
    let clock = MockClock::epoch();

    let pipeline = Pipeline::new(
        vec![Box::new(source)],
        translator,
        publisher.clone(),
        MemoryStore::new(),
        clock.clone(),
        PipelineConfig::default().with_min_interval(Duration::from_secs(3600)),
    );
    let trigger = Arc::new(SharedPipeline::new(Arc::new(Mutex::new(pipeline))));
    let state = Arc::new(AppState::new(trigger));

    TestApp {
        router: routes::router(state),
        publisher,
        clock,
    }
}

/// Router whose pipeline could not be assembled.
pub fn setup_unavailable_app() -> Router {
    let state = AppState::unavailable("TIDINGS_BOT_TOKEN not set. Required for publishing.");
    routes::router(Arc::new(state))
}

struct FailingTrigger;

#[async_trait]
impl CycleTrigger for FailingTrigger {
    async fn trigger(&self) -> Result<CycleReport, AppError> {
        Err(AppError::Generic("Cycle task failed: boom".into()))
    }
}

/// Router whose trigger always fails.
pub fn setup_failing_app() -> Router {
    routes::router(Arc::new(AppState::new(Arc::new(FailingTrigger))))
}
