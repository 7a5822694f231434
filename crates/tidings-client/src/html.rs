//! Headline scraper for pages without a feed.

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tidings_core::config::HtmlSourceSpec;
use tidings_core::error::AppError;
use tidings_core::models::CandidateItem;
use tidings_core::traits::SourceReader;
use url::Url;

use crate::fetcher::ReqwestFetcher;

/// Extracts `{title, link}` pairs from an HTML page with a CSS selector.
///
/// The selector may target the anchors themselves (`h3 > a`) or a wrapper
/// element containing one (`article.story`); in the latter case the first
/// `a[href]` inside the match is used. A wrapper's title is its first
/// non-empty heading, else its text outside that anchor, else the anchor
/// text.
pub struct HtmlHeadlineReader {
    url: String,
    base: Url,
    selector: String,
    fetcher: ReqwestFetcher,
    limit: usize,
}

impl HtmlHeadlineReader {
    /// Validates both the page URL and the selector up front so a typo in
    /// configuration fails at startup rather than on every cycle.
    pub fn new(
        url: impl Into<String>,
        selector: impl Into<String>,
        fetcher: ReqwestFetcher,
        limit: usize,
    ) -> Result<Self, AppError> {
        let url = url.into();
        let selector = selector.into();
        let base = Url::parse(&url)
            .map_err(|e| AppError::ConfigError(format!("Invalid source URL '{url}': {e}")))?;
        parse_selector(&selector)?;

        Ok(Self {
            url,
            base,
            selector,
            fetcher,
            limit,
        })
    }

    pub fn from_spec(
        spec: &HtmlSourceSpec,
        fetcher: ReqwestFetcher,
        limit: usize,
    ) -> Result<Self, AppError> {
        Self::new(&spec.url, &spec.selector, fetcher, limit)
    }
}

#[async_trait]
impl SourceReader for HtmlHeadlineReader {
    fn name(&self) -> &str {
        &self.url
    }

    async fn read(&self) -> Result<Vec<CandidateItem>, AppError> {
        let html = self
            .fetcher
            .fetch_text(&self.url)
            .await
            .map_err(|e| AppError::source_failure(&self.url, e))?;

        let items = extract_headlines(&html, &self.base, &self.selector, self.limit)
            .map_err(|e| AppError::source_failure(&self.url, e))?;
        tracing::debug!(page = %self.url, items = items.len(), "Scraped headlines");
        Ok(items)
    }
}

/// Pull headlines out of `html` in document order, resolving relative
/// links against `base`. Repeated links keep their first occurrence.
pub fn extract_headlines(
    html: &str,
    base: &Url,
    selector: &str,
    limit: usize,
) -> Result<Vec<CandidateItem>, AppError> {
    let selector = parse_selector(selector)?;
    let anchor = parse_selector("a[href]")?;
    let heading = parse_selector("h1, h2, h3, h4, h5, h6")?;
    let document = Html::parse_document(html);

    let mut seen_links = HashSet::new();
    let mut items = Vec::new();

    for element in document.select(&selector) {
        if items.len() >= limit {
            break;
        }

        let Some(link_el) = anchor_of(element, &anchor) else {
            continue;
        };
        let Some(href) = link_el.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }

        let title = headline_title(element, link_el, &heading);
        if title.is_empty() {
            continue;
        }

        let link = resolved.to_string();
        if !seen_links.insert(link.clone()) {
            continue;
        }
        if let Some(item) = CandidateItem::new(title, link) {
            items.push(item);
        }
    }

    Ok(items)
}

fn anchor_of<'a>(element: ElementRef<'a>, anchor: &Selector) -> Option<ElementRef<'a>> {
    if element.value().name() == "a" {
        Some(element)
    } else {
        element.select(anchor).next()
    }
}

fn headline_title(element: ElementRef<'_>, link_el: ElementRef<'_>, heading: &Selector) -> String {
    if element.id() == link_el.id() {
        return collapse_whitespace(element.text());
    }

    if let Some(title) = element
        .select(heading)
        .map(|h| collapse_whitespace(h.text()))
        .find(|t| !t.is_empty())
    {
        return title;
    }

    let outside_link = element.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let in_link = node.ancestors().any(|a| a.id() == link_el.id());
        (!in_link).then_some(&**text)
    });
    let title = collapse_whitespace(outside_link);
    if title.is_empty() {
        collapse_whitespace(link_el.text())
    } else {
        title
    }
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(selector: &str) -> Result<Selector, AppError> {
    Selector::parse(selector)
        .map_err(|e| AppError::ConfigError(format!("Invalid CSS selector '{selector}': {e}")))
}
