use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{CandidateItem, OutboundMessage};

/// Turns one external feed or page into candidate items.
///
/// A reader is bound to a single source. Sources of different kinds are
/// mixed in one pipeline, so this trait is object-safe.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Short name used in logs (usually the source URL).
    fn name(&self) -> &str;

    /// Read the source. Most recent first when the source exposes dates.
    ///
    /// Entries missing a title or link are dropped by the reader; network
    /// and parse failures are returned as errors for the caller to skip.
    async fn read(&self) -> Result<Vec<CandidateItem>, AppError>;
}

/// One translation backend in the fallback chain.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, AppError>;
}

/// Sends a composed message to the channel.
///
/// `Ok(())` means the transport confirmed delivery; anything else leaves
/// the item unsent.
pub trait Publisher: Send + Sync {
    fn publish(&self, message: &OutboundMessage)
    -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Small key-value persistence interface for pipeline state.
///
/// `set` may buffer; `flush` makes every buffered record durable.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError>;

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError>;

    fn flush(&self) -> Result<(), AppError>;
}

/// Source of "now" for the run gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
