//! RSS / Atom / JSON Feed source reader.

use async_trait::async_trait;
use feed_rs::model::Entry;
use tidings_core::error::AppError;
use tidings_core::models::CandidateItem;
use tidings_core::traits::SourceReader;

use crate::fetcher::ReqwestFetcher;

/// Reads one syndication feed.
pub struct FeedReader {
    url: String,
    fetcher: ReqwestFetcher,
    limit: usize,
}

impl FeedReader {
    pub fn new(url: impl Into<String>, fetcher: ReqwestFetcher, limit: usize) -> Self {
        Self {
            url: url.into(),
            fetcher,
            limit,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceReader for FeedReader {
    fn name(&self) -> &str {
        &self.url
    }

    async fn read(&self) -> Result<Vec<CandidateItem>, AppError> {
        let bytes = self
            .fetcher
            .fetch_bytes(&self.url)
            .await
            .map_err(|e| AppError::source_failure(&self.url, e))?;

        let items = parse_feed(&bytes, self.limit)
            .map_err(|e| AppError::source_failure(&self.url, e))?;
        tracing::debug!(feed = %self.url, items = items.len(), "Parsed feed");
        Ok(items)
    }
}

/// Parse a feed body into at most `limit` items.
///
/// Entries are ordered newest-first when every entry carries a date;
/// otherwise document order is kept. Entries without both a title and a
/// link are dropped. The first image among an entry's media attachments
/// (`media:content`, enclosures) becomes the item's image.
pub fn parse_feed(bytes: &[u8], limit: usize) -> Result<Vec<CandidateItem>, AppError> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| AppError::ParseError(format!("Failed to parse feed: {e}")))?;

    let mut dated: Vec<_> = feed
        .entries
        .iter()
        .filter_map(|entry| {
            let title = entry.title.as_ref().map(|t| t.content.trim())?;
            let link = entry_link(entry)?;
            if title.is_empty() {
                return None;
            }
            let item = CandidateItem::new(title, link)?.with_image(entry_image(entry));
            Some((entry.published.or(entry.updated), item))
        })
        .collect();

    if dated.iter().all(|(date, _)| date.is_some()) {
        // Stable, so equal timestamps keep document order.
        dated.sort_by(|a, b| b.0.cmp(&a.0));
    }

    Ok(dated
        .into_iter()
        .map(|(_, item)| item)
        .take(limit)
        .collect())
}

fn entry_link(entry: &Entry) -> Option<&str> {
    let non_empty = || entry.links.iter().filter(|l| !l.href.trim().is_empty());

    non_empty()
        .find(|l| {
            l.rel
                .as_deref()
                .is_none_or(|rel| rel.eq_ignore_ascii_case("alternate"))
        })
        .or_else(|| non_empty().next())
        .map(|l| l.href.trim())
        .or_else(|| {
            let id = entry.id.trim();
            (id.starts_with("http://") || id.starts_with("https://")).then_some(id)
        })
}

/// First media content that is an image, or whose type is not declared.
fn entry_image(entry: &Entry) -> Option<String> {
    entry
        .media
        .iter()
        .flat_map(|media| media.content.iter())
        .filter(|content| {
            content
                .content_type
                .as_ref()
                .is_none_or(|mime| mime.ty().as_str() == "image")
        })
        .find_map(|content| content.url.as_ref())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
}
