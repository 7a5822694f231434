//! HTTP translation backends for the fallback chain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tidings_core::error::AppError;
use tidings_core::traits::TranslationProvider;

use crate::fetcher::classify;

/// Public endpoint of Google's web translator.
pub const GOOGLE_WEB_URL: &str = "https://translate.googleapis.com/translate_a/single";

fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

fn translation_error(provider: &str, message: impl Into<String>) -> AppError {
    AppError::TranslationError {
        provider: provider.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// LibreTranslate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
pub struct LibreTranslateProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl LibreTranslateProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            api_key: None,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &str {
        "libretranslate"
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, AppError> {
        let body = LibreRequest {
            q: text,
            source: source_lang,
            target: target_lang,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout_secs))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimitExceeded);
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify(e, self.timeout_secs))?;
        let parsed = serde_json::from_str::<LibreResponse>(&body);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|p| p.error)
                .unwrap_or_else(|| "no detail".to_string());
            return Err(translation_error(
                self.name(),
                format!("HTTP {}: {detail}", status.as_u16()),
            ));
        }

        parsed
            .map_err(|e| translation_error(self.name(), format!("Invalid response: {e}")))?
            .translated_text
            .ok_or_else(|| translation_error(self.name(), "Response has no translatedText"))
    }
}

// ---------------------------------------------------------------------------
// Google web translator
// ---------------------------------------------------------------------------

/// Keyless client for the `translate_a/single` endpoint used by the Google
/// Translate web widget.
pub struct GoogleWebProvider {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
}

impl GoogleWebProvider {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_endpoint(GOOGLE_WEB_URL, timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl TranslationProvider for GoogleWebProvider {
    fn name(&self) -> &str {
        "google-web"
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, AppError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| classify(e, self.timeout_secs))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(translation_error(
                self.name(),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| translation_error(self.name(), format!("Invalid response: {e}")))?;

        join_segments(&value)
            .ok_or_else(|| translation_error(self.name(), "Unexpected response shape"))
    }
}

/// The response is a nested array whose first element lists
/// `[translated, original, ...]` segments, one per sentence.
fn join_segments(value: &serde_json::Value) -> Option<String> {
    let segments = value.get(0)?.as_array()?;
    let joined: String = segments
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .collect();
    Some(joined)
}
