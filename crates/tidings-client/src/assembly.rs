//! Builds the production pipeline from configuration.

use tidings_core::config::TidingsConfig;
use tidings_core::error::AppError;
use tidings_core::pipeline::Pipeline;
use tidings_core::publish::PacedPublisher;
use tidings_core::state::JsonFileStore;
use tidings_core::traits::{SourceReader, SystemClock};
use tidings_core::translate::TranslationChain;

use crate::feed::FeedReader;
use crate::fetcher::ReqwestFetcher;
use crate::html::HtmlHeadlineReader;
use crate::telegram::TelegramPublisher;
use crate::translate::{GoogleWebProvider, LibreTranslateProvider};

/// The pipeline as wired by the binaries.
pub type LivePipeline = Pipeline<JsonFileStore, PacedPublisher<TelegramPublisher>, SystemClock>;

/// One reader per configured feed, then one per HTML source, in that order.
pub fn build_sources(config: &TidingsConfig) -> Result<Vec<Box<dyn SourceReader>>, AppError> {
    let fetcher = ReqwestFetcher::with_timeout(config.fetch_timeout)?;
    let mut sources: Vec<Box<dyn SourceReader>> = Vec::new();

    for url in &config.feeds {
        sources.push(Box::new(FeedReader::new(
            url,
            fetcher.clone(),
            config.per_source_limit,
        )));
    }
    for spec in &config.html_sources {
        sources.push(Box::new(HtmlHeadlineReader::from_spec(
            spec,
            fetcher.clone(),
            config.per_source_limit,
        )?));
    }

    Ok(sources)
}

/// LibreTranslate first (when configured), Google web second (when enabled).
pub fn build_translation_chain(config: &TidingsConfig) -> Result<TranslationChain, AppError> {
    let mut chain = TranslationChain::new(&config.source_lang, &config.target_lang)
        .with_timeout(config.translate_timeout);

    if let Some(url) = &config.translate_url {
        let libre = LibreTranslateProvider::new(url, config.translate_timeout)?
            .with_api_key(config.translate_api_key.clone());
        chain = chain.with_provider(libre);
    }
    if config.google_fallback {
        chain = chain.with_provider(GoogleWebProvider::new(config.translate_timeout)?);
    }

    if chain.is_empty() {
        tracing::warn!("No translation providers configured; titles are posted untranslated");
    }
    Ok(chain)
}

pub fn build_publisher(
    config: &TidingsConfig,
) -> Result<PacedPublisher<TelegramPublisher>, AppError> {
    let (token, channel) = config.telegram_credentials()?;
    let telegram = TelegramPublisher::new(token, channel)?;
    Ok(PacedPublisher::new(telegram, config.pacing))
}

/// Wire readers, translators, publisher, and file-backed state into a pipeline.
pub fn build_pipeline(config: &TidingsConfig) -> Result<LivePipeline, AppError> {
    let sources = build_sources(config)?;
    let translator = build_translation_chain(config)?;
    let publisher = build_publisher(config)?;
    let store = JsonFileStore::new(config.state_dir.clone());

    tracing::info!(
        sources = sources.len(),
        translators = ?translator.provider_names(),
        state_dir = %config.state_dir.display(),
        "Pipeline assembled"
    );

    Ok(Pipeline::new(
        sources,
        translator,
        publisher,
        store,
        SystemClock,
        config.pipeline_config(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> TidingsConfig {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TidingsConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn sources_follow_configured_order() {
        let cfg = config(&[
            ("TIDINGS_FEEDS", "https://a.example.com/rss,https://b.example.com/rss"),
            ("TIDINGS_HTML_SOURCES", "https://c.example.com/news|h3 > a"),
        ]);
        let sources = build_sources(&cfg).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "https://a.example.com/rss",
                "https://b.example.com/rss",
                "https://c.example.com/news"
            ]
        );
    }

    #[test]
    fn bad_html_selector_fails_assembly() {
        let cfg = config(&[("TIDINGS_HTML_SOURCES", "https://c.example.com/news|h3 >>> a[")]);
        assert!(matches!(
            build_sources(&cfg).err(),
            Some(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn chain_order_is_libre_then_google() {
        let cfg = config(&[]);
        let chain = build_translation_chain(&cfg).unwrap();
        assert_eq!(chain.provider_names(), vec!["libretranslate", "google-web"]);
    }

    #[test]
    fn translation_can_be_disabled_entirely() {
        let cfg = config(&[
            ("TIDINGS_TRANSLATE_URL", ""),
            ("TIDINGS_GOOGLE_FALLBACK", "false"),
        ]);
        assert!(build_translation_chain(&cfg).unwrap().is_empty());
    }

    #[test]
    fn publisher_requires_credentials() {
        let cfg = config(&[]);
        assert!(matches!(
            build_publisher(&cfg).err(),
            Some(AppError::ConfigError(_))
        ));

        let cfg = config(&[
            ("TIDINGS_BOT_TOKEN", "1:abc"),
            ("TIDINGS_CHANNEL_ID", "@markets"),
            ("TIDINGS_PACING_MS", "250"),
        ]);
        let publisher = build_publisher(&cfg).unwrap();
        assert_eq!(publisher.inner().chat_id(), "@markets");
        assert_eq!(publisher.pacing(), std::time::Duration::from_millis(250));
    }

    #[test]
    fn pipeline_starts_fresh_on_empty_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&[
            ("TIDINGS_BOT_TOKEN", "1:abc"),
            ("TIDINGS_CHANNEL_ID", "@markets"),
            ("TIDINGS_STATE_DIR", dir.path().to_str().unwrap()),
            ("TIDINGS_MAX_PER_CYCLE", "3"),
        ]);
        let pipeline = build_pipeline(&cfg).unwrap();
        assert!(pipeline.last_run().is_none());
        assert!(pipeline.dedup().seen().is_empty());
        assert_eq!(pipeline.config().max_per_cycle, 3);
    }
}
