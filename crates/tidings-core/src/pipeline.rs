use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dedup::{DEFAULT_SEEN_CAPACITY, Deduplicator};
use crate::gate::{DEFAULT_MIN_INTERVAL, RunGate};
use crate::models::{
    CandidateItem, CycleOutcome, CycleReport, DedupKey, OutboundMessage, compose_message,
};
use crate::traits::{Clock, Publisher, SourceReader, StateStore};
use crate::translate::TranslationChain;

/// Default cap on publishes per cycle.
pub const DEFAULT_MAX_PER_CYCLE: usize = 5;

/// Tunables for one [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Publish at most this many items per cycle.
    pub max_per_cycle: usize,
    /// Remember at most this many published keys.
    pub seen_capacity: usize,
    /// Minimum time between two cycles.
    pub min_interval: Duration,
    /// Abandon remaining items once a cycle has run this long.
    pub deadline: Option<Duration>,
    pub allow_link_preview: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_per_cycle: DEFAULT_MAX_PER_CYCLE,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            min_interval: DEFAULT_MIN_INTERVAL,
            deadline: Some(Duration::from_secs(300)),
            allow_link_preview: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_per_cycle(mut self, max: usize) -> Self {
        self.max_per_cycle = max;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity;
        self
    }
}

/// Events emitted during a cycle for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CycleEvent<'a> {
    Skipped {
        retry_in: Duration,
    },
    Started {
        cycle_id: Uuid,
        sources: usize,
    },
    SourceRead {
        source: &'a str,
        items: usize,
    },
    SourceFailed {
        source: &'a str,
        error: &'a str,
    },
    FetchInterrupted,
    Filtered {
        fetched: usize,
        novel: usize,
        selected: usize,
    },
    Published {
        item: &'a CandidateItem,
        translated: bool,
    },
    PublishFailed {
        item: &'a CandidateItem,
        error: &'a str,
    },
    Abandoned {
        remaining: usize,
    },
    StateWriteFailed {
        error: &'a str,
    },
    Finished {
        report: &'a CycleReport,
    },
}

/// Trait for receiving cycle events (decoupled logging).
pub trait CycleReporter: Send + Sync {
    fn report(&self, event: CycleEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCycleReporter;

impl CycleReporter for TracingCycleReporter {
    fn report(&self, event: CycleEvent<'_>) {
        match event {
            CycleEvent::Skipped { retry_in } => {
                tracing::debug!(retry_in_secs = retry_in.as_secs(), "Cycle skipped, gate closed");
            }
            CycleEvent::Started { cycle_id, sources } => {
                tracing::info!(%cycle_id, %sources, "Cycle started");
            }
            CycleEvent::SourceRead { source, items } => {
                tracing::info!(%source, %items, "Source read");
            }
            CycleEvent::SourceFailed { source, error } => {
                tracing::warn!(%source, %error, "Source failed, skipping");
            }
            CycleEvent::FetchInterrupted => {
                tracing::warn!("Fetch interrupted by deadline or cancellation");
            }
            CycleEvent::Filtered {
                fetched,
                novel,
                selected,
            } => {
                tracing::info!(%fetched, %novel, %selected, "Items filtered");
            }
            CycleEvent::Published { item, translated } => {
                tracing::info!(link = %item.link, %translated, "Item published");
            }
            CycleEvent::PublishFailed { item, error } => {
                tracing::warn!(
                    link = %item.link,
                    %error,
                    "Publish failed, item left for next cycle"
                );
            }
            CycleEvent::Abandoned { remaining } => {
                tracing::warn!(%remaining, "Cycle deadline reached, remaining items abandoned");
            }
            CycleEvent::StateWriteFailed { error } => {
                tracing::error!(%error, "Failed to persist state");
            }
            CycleEvent::Finished { report } => {
                tracing::info!(
                    cycle_id = %report.cycle_id,
                    published = report.published,
                    failed = report.failed,
                    abandoned = report.abandoned,
                    "Cycle finished"
                );
            }
        }
    }
}

/// Orchestrates one cycle: gate check → fetch → filter → cap →
/// translate and send → persist.
///
/// Sole owner of the seen list and run gate state. Driven through
/// `&mut self`, so two cycles can never overlap on the same state.
pub struct Pipeline<S, P, C>
where
    S: StateStore + Clone,
    P: Publisher,
    C: Clock,
{
    sources: Vec<Box<dyn SourceReader>>,
    translator: TranslationChain,
    publisher: P,
    dedup: Deduplicator<S>,
    gate: RunGate<S, C>,
    config: PipelineConfig,
}

impl<S, P, C> Pipeline<S, P, C>
where
    S: StateStore + Clone,
    P: Publisher,
    C: Clock,
{
    /// Build a pipeline, loading the seen list and last-run time from `store`.
    pub fn new(
        sources: Vec<Box<dyn SourceReader>>,
        translator: TranslationChain,
        publisher: P,
        store: S,
        clock: C,
        config: PipelineConfig,
    ) -> Self {
        let dedup = Deduplicator::load(store.clone(), config.seen_capacity);
        let gate = RunGate::load(store, clock, config.min_interval);
        Self {
            sources,
            translator,
            publisher,
            dedup,
            gate,
            config,
        }
    }

    /// Run one cycle with the tracing reporter and no external cancellation.
    pub async fn run_once(&mut self) -> CycleReport {
        self.run_cycle(&CancellationToken::new(), &TracingCycleReporter)
            .await
    }

    /// Run one cycle. Never fails: every error is logged through `reporter`
    /// and downgraded; the returned report says what happened.
    pub async fn run_cycle<R: CycleReporter>(
        &mut self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> CycleReport {
        let started_at = self.gate.now();

        // GATE_CHECK
        if !self.gate.allowed() {
            reporter.report(CycleEvent::Skipped {
                retry_in: self.gate.remaining(),
            });
            return CycleReport::skipped(started_at);
        }

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let mut report = CycleReport {
            outcome: CycleOutcome::Completed,
            ..CycleReport::skipped(started_at)
        };
        reporter.report(CycleEvent::Started {
            cycle_id: report.cycle_id,
            sources: self.sources.len(),
        });

        // FETCH
        let fetched = self.fetch_all(cancel, deadline, reporter).await;
        report.fetched = fetched.len();

        // FILTER
        let novel = self.filter_novel(fetched);
        report.novel = novel.len();

        // CAP
        let selected: Vec<(DedupKey, CandidateItem)> =
            novel.into_iter().take(self.config.max_per_cycle).collect();
        reporter.report(CycleEvent::Filtered {
            fetched: report.fetched,
            novel: report.novel,
            selected: selected.len(),
        });

        // TRANSLATE_AND_SEND
        let total = selected.len();
        for (index, (key, item)) in selected.into_iter().enumerate() {
            if cancel.is_cancelled() || deadline_passed(deadline) {
                report.abandoned = total - index;
                reporter.report(CycleEvent::Abandoned {
                    remaining: report.abandoned,
                });
                break;
            }

            report.attempted += 1;
            let translated = self.translator.translate(&item.title).await;
            let message = OutboundMessage::text(
                compose_message(&translated.text, &item.link),
                self.config.allow_link_preview,
            )
            .with_image(item.image.clone());

            match self.publisher.publish(&message).await {
                Ok(()) => {
                    report.published += 1;
                    reporter.report(CycleEvent::Published {
                        item: &item,
                        translated: !translated.used_fallback,
                    });
                    if let Err(e) = self.dedup.mark_seen(key) {
                        let error = e.to_string();
                        reporter.report(CycleEvent::StateWriteFailed { error: &error });
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    let error = e.to_string();
                    reporter.report(CycleEvent::PublishFailed {
                        item: &item,
                        error: &error,
                    });
                }
            }
        }

        // PERSIST
        if self.dedup.is_dirty() {
            if let Err(e) = self.dedup.flush() {
                let error = e.to_string();
                reporter.report(CycleEvent::StateWriteFailed { error: &error });
            }
        }
        let finished_at = self.gate.now();
        if let Err(e) = self.gate.record_run(finished_at) {
            let error = e.to_string();
            reporter.report(CycleEvent::StateWriteFailed { error: &error });
        }

        reporter.report(CycleEvent::Finished { report: &report });
        report
    }

    /// Read every source concurrently; results are concatenated in source
    /// order. A failing source is reported and contributes nothing.
    async fn fetch_all<R: CycleReporter>(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        reporter: &R,
    ) -> Vec<CandidateItem> {
        let reads = join_all(
            self.sources
                .iter()
                .map(|source| async move { (source.name(), source.read().await) }),
        );

        let results = tokio::select! {
            results = reads => results,
            () = cancel.cancelled() => {
                reporter.report(CycleEvent::FetchInterrupted);
                return Vec::new();
            }
            () = sleep_until_deadline(deadline) => {
                reporter.report(CycleEvent::FetchInterrupted);
                return Vec::new();
            }
        };

        let mut items = Vec::new();
        for (source, result) in results {
            match result {
                Ok(read) => {
                    reporter.report(CycleEvent::SourceRead {
                        source,
                        items: read.len(),
                    });
                    items.extend(read);
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(CycleEvent::SourceFailed {
                        source,
                        error: &error,
                    });
                }
            }
        }
        items
    }

    /// Keep items not yet published and not already claimed earlier in
    /// this cycle (two sources may carry the same link).
    fn filter_novel(&self, items: Vec<CandidateItem>) -> Vec<(DedupKey, CandidateItem)> {
        let mut claimed: HashSet<DedupKey> = HashSet::new();
        items
            .into_iter()
            .filter_map(|item| {
                let key = item.key();
                if self.dedup.is_new(&key) && claimed.insert(key.clone()) {
                    Some((key, item))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn dedup(&self) -> &Deduplicator<S> {
        &self.dedup
    }

    pub fn gate(&self) -> &RunGate<S, C> {
        &self.gate
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.gate.last_run()
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
