//! Ordered fallback chain over translation providers.
//!
//! Translation is an enhancement, never a dependency: [`TranslationChain::translate`]
//! cannot fail and returns the original text when every provider is exhausted.

use std::time::Duration;

use crate::error::AppError;
use crate::models::TranslationResult;
use crate::traits::TranslationProvider;

/// Default per-provider time budget.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

pub struct TranslationChain {
    providers: Vec<Box<dyn TranslationProvider>>,
    source_lang: String,
    target_lang: String,
    timeout: Duration,
}

impl TranslationChain {
    pub fn new(source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// A chain with no providers: every title passes through untranslated.
    pub fn disabled() -> Self {
        Self::new("auto", "auto")
    }

    /// Append a provider; providers are tried in the order they were added.
    pub fn with_provider(mut self, provider: impl TranslationProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn push_boxed(&mut self, provider: Box<dyn TranslationProvider>) {
        self.providers.push(provider);
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Translate `text`, trying each provider in order.
    ///
    /// A provider's answer is accepted only if it is non-empty and differs
    /// from the input ignoring case; several services echo the input
    /// instead of reporting an error.
    pub async fn translate(&self, text: &str) -> TranslationResult {
        if text.trim().is_empty() {
            return TranslationResult {
                text: text.to_string(),
                used_fallback: true,
            };
        }

        for provider in &self.providers {
            match self.try_provider(provider.as_ref(), text).await {
                Ok(translated) => {
                    tracing::debug!(provider = provider.name(), "Translation accepted");
                    return TranslationResult {
                        text: translated,
                        used_fallback: false,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Translation provider failed, trying next"
                    );
                }
            }
        }

        if !self.providers.is_empty() {
            tracing::info!("All translation providers failed, keeping original text");
        }
        TranslationResult {
            text: text.to_string(),
            used_fallback: true,
        }
    }

    async fn try_provider(
        &self,
        provider: &dyn TranslationProvider,
        text: &str,
    ) -> Result<String, AppError> {
        let call = provider.translate(text, &self.source_lang, &self.target_lang);
        let translated = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_secs()))??;

        let translated = translated.trim();
        if translated.is_empty() {
            return Err(AppError::TranslationError {
                provider: provider.name().to_string(),
                message: "empty result".into(),
            });
        }
        if translated.to_lowercase() == text.trim().to_lowercase() {
            return Err(AppError::TranslationError {
                provider: provider.name().to_string(),
                message: "result echoes the input".into(),
            });
        }
        Ok(translated.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockTranslator;

    #[tokio::test]
    async fn first_good_provider_wins() {
        let first = MockTranslator::returning("a", "Привіт");
        let second = MockTranslator::returning("b", "Вітаю");
        let chain = TranslationChain::new("en", "uk")
            .with_provider(first.clone())
            .with_provider(second.clone());

        let result = chain.translate("Hello").await;
        assert_eq!(result.text, "Привіт");
        assert!(!result.used_fallback);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn echo_is_treated_as_failure() {
        let echo = MockTranslator::echo("echo");
        let good = MockTranslator::returning("good", "ФРС підвищує ставки");
        let chain = TranslationChain::new("en", "uk")
            .with_provider(echo.clone())
            .with_provider(good.clone());

        let result = chain.translate("Fed hikes rates").await;
        assert_eq!(result.text, "ФРС підвищує ставки");
        assert_eq!(echo.calls(), 1);
        assert_eq!(good.calls(), 1);
    }

    #[tokio::test]
    async fn case_only_difference_counts_as_echo() {
        let chain = TranslationChain::new("en", "uk")
            .with_provider(MockTranslator::returning("upper", "FED HIKES RATES"));
        let result = chain.translate("Fed hikes rates").await;
        assert_eq!(result.text, "Fed hikes rates");
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn empty_result_falls_through() {
        let chain = TranslationChain::new("en", "uk")
            .with_provider(MockTranslator::returning("blank", "   "))
            .with_provider(MockTranslator::returning("good", "Нафта дешевшає"));
        assert_eq!(chain.translate("Oil slides").await.text, "Нафта дешевшає");
    }

    #[tokio::test]
    async fn errors_fall_through() {
        let chain = TranslationChain::new("en", "uk")
            .with_provider(MockTranslator::failing(
                "down",
                AppError::NetworkError("refused".into()),
            ))
            .with_provider(MockTranslator::returning("good", "Акції зростають"));
        assert_eq!(chain.translate("Stocks rally").await.text, "Акції зростають");
    }

    #[tokio::test]
    async fn all_failing_returns_input_unchanged() {
        let chain = TranslationChain::new("en", "uk")
            .with_provider(MockTranslator::echo("echo"))
            .with_provider(MockTranslator::failing(
                "down",
                AppError::HttpError("HTTP 500".into()),
            ));
        let result = chain.translate("Fed hikes rates").await;
        assert_eq!(result.text, "Fed hikes rates");
        assert!(result.used_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_and_next_is_used() {
        let slow =
            MockTranslator::returning("slow", "Повільно").with_delay(Duration::from_secs(60));
        let fast = MockTranslator::returning("fast", "Швидко");
        let chain = TranslationChain::new("en", "uk")
            .with_timeout(Duration::from_secs(5))
            .with_provider(slow)
            .with_provider(fast);

        let result = chain.translate("Quickly").await;
        assert_eq!(result.text, "Швидко");
    }

    #[tokio::test]
    async fn disabled_chain_passes_through() {
        let chain = TranslationChain::disabled();
        assert!(chain.is_empty());
        let result = chain.translate("Markets close higher").await;
        assert_eq!(result.text, "Markets close higher");
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn empty_input_skips_providers() {
        let provider = MockTranslator::returning("a", "x");
        let chain = TranslationChain::new("en", "uk").with_provider(provider.clone());
        assert_eq!(chain.translate("  ").await.text, "  ");
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn provider_order_is_preserved() {
        let chain = TranslationChain::new("en", "uk")
            .with_provider(MockTranslator::echo("libre"))
            .with_provider(MockTranslator::echo("google"));
        assert_eq!(chain.provider_names(), vec!["libre", "google"]);
    }
}
