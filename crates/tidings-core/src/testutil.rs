//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::AppError;
use crate::models::{CandidateItem, OutboundMessage};
use crate::traits::{Clock, Publisher, SourceReader, StateStore, TranslationProvider};

// ---------------------------------------------------------------------------
// MockClock
// ---------------------------------------------------------------------------

/// Manually advanced clock.
#[derive(Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// 2026-01-01T00:00:00Z.
    pub fn epoch() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::TimeDelta::from_std(by).unwrap();
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Mock source that replays configured reads.
#[derive(Clone)]
pub struct MockSource {
    name: String,
    /// Queue of responses. Each read pops the first element; once only one
    /// remains it is repeated forever.
    responses: Arc<Mutex<Vec<Result<Vec<CandidateItem>, String>>>>,
    reads: Arc<Mutex<usize>>,
}

impl MockSource {
    /// A source that yields `items` on every read.
    pub fn new(name: &str, items: Vec<CandidateItem>) -> Self {
        Self::with_responses(name, vec![Ok(items)])
    }

    /// A source whose every read fails.
    pub fn failing(name: &str, message: &str) -> Self {
        Self::with_responses(name, vec![Err(message.to_string())])
    }

    pub fn with_responses(name: &str, responses: Vec<Result<Vec<CandidateItem>, String>>) -> Self {
        Self {
            name: name.to_string(),
            responses: Arc::new(Mutex::new(responses)),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

#[async_trait]
impl SourceReader for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<Vec<CandidateItem>, AppError> {
        *self.reads.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.first().cloned().unwrap_or_else(|| Ok(Vec::new()))
        };
        next.map_err(|message| AppError::source_failure(&self.name, message))
    }
}

/// Shorthand for building a valid item in tests.
pub fn item(title: &str, link: &str) -> CandidateItem {
    CandidateItem::new(title, link).expect("test item must have a title or link")
}

// ---------------------------------------------------------------------------
// MockTranslator
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum TranslatorBehavior {
    Fixed(String),
    Echo,
    Prefix(String),
    Fail(Arc<Mutex<Option<AppError>>>),
}

/// Mock translation provider with a fixed behaviour.
#[derive(Clone)]
pub struct MockTranslator {
    name: String,
    behavior: TranslatorBehavior,
    delay: Duration,
    calls: Arc<Mutex<usize>>,
}

impl MockTranslator {
    fn build(name: &str, behavior: TranslatorBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Always answers `text`.
    pub fn returning(name: &str, text: &str) -> Self {
        Self::build(name, TranslatorBehavior::Fixed(text.to_string()))
    }

    /// Answers with the input unchanged.
    pub fn echo(name: &str) -> Self {
        Self::build(name, TranslatorBehavior::Echo)
    }

    /// Answers `"{prefix}{input}"`.
    pub fn prefixing(name: &str, prefix: &str) -> Self {
        Self::build(name, TranslatorBehavior::Prefix(prefix.to_string()))
    }

    /// Fails with `error` on the first call, then with a generic error.
    pub fn failing(name: &str, error: AppError) -> Self {
        Self::build(
            name,
            TranslatorBehavior::Fail(Arc::new(Mutex::new(Some(error)))),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TranslationProvider for MockTranslator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            TranslatorBehavior::Fixed(out) => Ok(out.clone()),
            TranslatorBehavior::Echo => Ok(text.to_string()),
            TranslatorBehavior::Prefix(prefix) => Ok(format!("{prefix}{text}")),
            TranslatorBehavior::Fail(error) => {
                let taken = error.lock().unwrap().take();
                Err(taken.unwrap_or_else(|| AppError::TranslationError {
                    provider: self.name.clone(),
                    message: "mock failure".into(),
                }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Mock publisher that records every attempt and successful send.
#[derive(Clone, Default)]
pub struct MockPublisher {
    /// Messages the transport "delivered".
    pub sent: Arc<Mutex<Vec<OutboundMessage>>>,
    /// Every message handed to `publish`, delivered or not.
    pub attempts: Arc<Mutex<Vec<OutboundMessage>>>,
    /// Queue of results. Each call pops the first; empty means success.
    results: Arc<Mutex<Vec<Result<(), AppError>>>>,
    /// Messages containing any of these substrings fail.
    fail_matching: Arc<Mutex<Vec<String>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: Vec<Result<(), AppError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            ..Self::default()
        }
    }

    /// Fail every publish whose text contains `needle`.
    pub fn failing_on(needle: &str) -> Self {
        let publisher = Self::default();
        publisher
            .fail_matching
            .lock()
            .unwrap()
            .push(needle.to_string());
        publisher
    }

    /// Stop failing on previously configured substrings.
    pub fn heal(&self) {
        self.fail_matching.lock().unwrap().clear();
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl Publisher for MockPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), AppError> {
        self.attempts.lock().unwrap().push(message.clone());

        let fails = self
            .fail_matching
            .lock()
            .unwrap()
            .iter()
            .any(|needle| message.text.contains(needle.as_str()));
        if fails {
            return Err(AppError::PublishError("mock transport failure".into()));
        }

        let next = {
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(())
            } else {
                results.remove(0)
            }
        };
        if next.is_ok() {
            self.sent.lock().unwrap().push(message.clone());
        }
        next
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// State store whose every operation fails, for degradation tests.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub set_calls: Arc<Mutex<usize>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        Err(AppError::StateError(format!("cannot read {key}")))
    }

    fn set(&self, key: &str, _value: serde_json::Value) -> Result<(), AppError> {
        *self.set_calls.lock().unwrap() += 1;
        Err(AppError::StateError(format!("cannot write {key}")))
    }

    fn flush(&self) -> Result<(), AppError> {
        Err(AppError::StateError("cannot flush".into()))
    }
}
