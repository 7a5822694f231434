use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A news item as yielded by a source, before any novelty check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CandidateItem {
    pub title: String,
    pub link: String,
    /// Absolute URL of an illustration attached by the source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CandidateItem {
    /// Build an item from raw source fields, trimming whitespace.
    ///
    /// Returns `None` when both title and link are empty: such an entry
    /// carries nothing to publish or to fingerprint.
    pub fn new(title: impl AsRef<str>, link: impl AsRef<str>) -> Option<Self> {
        let title = title.as_ref().trim();
        let link = link.as_ref().trim();
        if title.is_empty() && link.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            link: link.to_string(),
            image: None,
        })
    }

    /// Attach an image URL; blank values are ignored.
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        self
    }

    /// Fingerprint used for novelty checks: the link, or the title when
    /// the item has no link.
    pub fn key(&self) -> DedupKey {
        if self.link.is_empty() {
            DedupKey::from_raw(&self.title)
        } else {
            DedupKey::from_raw(&self.link)
        }
    }
}

/// Deterministic fingerprint of a [`CandidateItem`] (SHA-256 hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn from_raw(value: &str) -> Self {
        Self(compute_hash(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message handed to a [`Publisher`](crate::traits::Publisher).
///
/// The channel is bound into the publisher itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub allow_link_preview: bool,
    /// When set, the message is posted as a photo with `text` as its caption.
    pub image_url: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>, allow_link_preview: bool) -> Self {
        Self {
            text: text.into(),
            allow_link_preview,
            image_url: None,
        }
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}

/// Result of running a title through the translation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub text: String,
    /// True when no provider produced an accepted translation and `text`
    /// is the original input.
    pub used_fallback: bool,
}

/// How a cycle attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleOutcome {
    /// The run gate was closed; nothing was fetched and no state changed.
    Skipped,
    /// The cycle ran to completion (possibly publishing nothing).
    Completed,
}

/// Summary of one cycle attempt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub outcome: CycleOutcome,
    pub started_at: DateTime<Utc>,
    /// Items returned by all sources combined.
    pub fetched: usize,
    /// Items that passed both novelty checks, before the cap.
    pub novel: usize,
    /// Items a publish was attempted for.
    pub attempted: usize,
    pub published: usize,
    pub failed: usize,
    /// Items left over because the deadline passed or the cycle was cancelled.
    pub abandoned: usize,
}

impl CycleReport {
    pub fn skipped(started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            outcome: CycleOutcome::Skipped,
            started_at,
            fetched: 0,
            novel: 0,
            attempted: 0,
            published: 0,
            failed: 0,
            abandoned: 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == CycleOutcome::Skipped
    }
}

/// Compose the channel message for an item: bold (translated) title on the
/// first line, link on the second. Both parts are HTML-escaped.
pub fn compose_message(title: &str, link: &str) -> String {
    let title = html_escape::encode_text(title);
    let link = html_escape::encode_text(link);
    if link.is_empty() {
        format!("<b>{title}</b>")
    } else {
        format!("<b>{title}</b>\n{link}")
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
