use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tidings_core::error::AppError;
use tidings_core::models::OutboundMessage;
use tidings_core::traits::Publisher;

use crate::fetcher::classify;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Bot API limit on photo captions, in characters after entity parsing.
const CAPTION_LIMIT: usize = 1024;

/// Posts messages to one Telegram chat or channel through the Bot API.
///
/// Messages carrying an image go out through `sendPhoto` with the text as
/// an HTML caption. If Telegram refuses the photo, the text is sent on its
/// own through `sendMessage`.
#[derive(Clone)]
pub struct TelegramPublisher {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for TelegramPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramPublisher")
            .field("base_url", &self.base_url)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramPublisher {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, AppError> {
        Self::with_base_url(token, chat_id, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: &str, chat_id: &str, base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout_secs))?;

        let status = response.status();
        let api: Option<ApiResponse> = response.json().await.ok();

        if status.as_u16() == 429 {
            let retry_after = api
                .as_ref()
                .and_then(|a| a.parameters.as_ref())
                .and_then(|p| p.retry_after);
            tracing::warn!(
                chat_id = %self.chat_id,
                method,
                ?retry_after,
                "Telegram rate limit hit"
            );
            return Err(AppError::RateLimitExceeded);
        }

        match api {
            Some(api) if status.is_success() && api.ok => Ok(()),
            Some(api) => Err(AppError::PublishError(format!(
                "Telegram rejected {method} (HTTP {}): {}",
                status.as_u16(),
                api.description.unwrap_or_else(|| "no description".into())
            ))),
            None => Err(AppError::PublishError(format!(
                "Telegram returned HTTP {} with an unreadable body",
                status.as_u16()
            ))),
        }
    }

    async fn send_text(&self, message: &OutboundMessage) -> Result<(), AppError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &message.text,
            parse_mode: "HTML",
            disable_web_page_preview: !message.allow_link_preview,
        };
        self.call("sendMessage", &body).await
    }
}

// ---- Bot API types ----

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl Publisher for TelegramPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), AppError> {
        let photo = message
            .image_url
            .as_deref()
            .filter(|_| message.text.chars().count() <= CAPTION_LIMIT);

        let Some(photo) = photo else {
            return self.send_text(message).await;
        };

        let body = SendPhoto {
            chat_id: &self.chat_id,
            photo,
            caption: &message.text,
            parse_mode: "HTML",
        };
        match self.call("sendPhoto", &body).await {
            // Refused outright, so nothing was posted.
            Err(AppError::PublishError(reason)) => {
                tracing::warn!(
                    chat_id = %self.chat_id,
                    %reason,
                    "Photo refused, sending text only"
                );
                self.send_text(message).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message(text: &str, allow_link_preview: bool) -> OutboundMessage {
        OutboundMessage::text(text, allow_link_preview)
    }

    fn ok_response() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"message_id": 7}}))
    }

    #[tokio::test]
    async fn sends_html_message_to_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_json(json!({
                "chat_id": "@markets",
                "text": "<b>Hello</b>\nhttps://x/a",
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": {"message_id": 7}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher =
            TelegramPublisher::with_base_url("TEST:TOKEN", "@markets", &server.uri()).unwrap();
        publisher
            .publish(&message("<b>Hello</b>\nhttps://x/a", false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn image_is_sent_as_photo_with_html_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendPhoto"))
            .and(body_json(json!({
                "chat_id": "@markets",
                "photo": "https://img.example.com/gold.jpg",
                "caption": "<b>Gold climbs</b>\nhttps://x/gold",
                "parse_mode": "HTML"
            })))
            .respond_with(ok_response())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .respond_with(ok_response())
            .expect(0)
            .mount(&server)
            .await;

        let publisher =
            TelegramPublisher::with_base_url("TEST:TOKEN", "@markets", &server.uri()).unwrap();
        let pictured = message("<b>Gold climbs</b>\nhttps://x/gold", true)
            .with_image(Some("https://img.example.com/gold.jpg".into()));
        publisher.publish(&pictured).await.unwrap();
    }

    #[tokio::test]
    async fn refused_photo_falls_back_to_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/sendPhoto"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: wrong file identifier/HTTP URL specified"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bott/sendMessage"))
            .and(body_json(json!({
                "chat_id": "@markets",
                "text": "<b>Gold</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": false
            })))
            .respond_with(ok_response())
            .expect(1)
            .mount(&server)
            .await;

        let publisher = TelegramPublisher::with_base_url("t", "@markets", &server.uri()).unwrap();
        let pictured =
            message("<b>Gold</b>", true).with_image(Some("https://img.example.com/x".into()));
        publisher.publish(&pictured).await.unwrap();
    }

    #[tokio::test]
    async fn rate_limited_photo_is_not_resent_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/sendPhoto"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "parameters": {"retry_after": 3}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bott/sendMessage"))
            .respond_with(ok_response())
            .expect(0)
            .mount(&server)
            .await;

        let publisher = TelegramPublisher::with_base_url("t", "1", &server.uri()).unwrap();
        let pictured = message("x", true).with_image(Some("https://img.example.com/x".into()));
        let err = publisher.publish(&pictured).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn text_over_caption_limit_is_sent_as_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/sendMessage"))
            .respond_with(ok_response())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bott/sendPhoto"))
            .respond_with(ok_response())
            .expect(0)
            .mount(&server)
            .await;

        let publisher = TelegramPublisher::with_base_url("t", "1", &server.uri()).unwrap();
        let long = "я".repeat(CAPTION_LIMIT + 1);
        let pictured = message(&long, true).with_image(Some("https://img.example.com/x".into()));
        publisher.publish(&pictured).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_message_is_publish_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let publisher = TelegramPublisher::with_base_url("t", "@nowhere", &server.uri()).unwrap();
        let err = publisher.publish(&message("x", true)).await.unwrap_err();
        assert!(matches!(err, AppError::PublishError(ref m) if m.contains("chat not found")));
    }

    #[tokio::test]
    async fn ok_false_with_success_status_is_still_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false})))
            .mount(&server)
            .await;

        let publisher = TelegramPublisher::with_base_url("t", "1", &server.uri()).unwrap();
        assert!(publisher.publish(&message("x", true)).await.is_err());
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 5",
                "parameters": {"retry_after": 5}
            })))
            .mount(&server)
            .await;

        let publisher = TelegramPublisher::with_base_url("t", "1", &server.uri()).unwrap();
        let err = publisher.publish(&message("x", true)).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_api_is_network_error() {
        // Nothing listens on port 9 locally.
        let publisher =
            TelegramPublisher::with_base_url("secret", "1", "http://127.0.0.1:9").unwrap();
        let err = publisher.publish(&message("x", true)).await.unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn debug_output_hides_token() {
        let publisher = TelegramPublisher::new("123:SECRET", "@c").unwrap();
        assert!(!format!("{publisher:?}").contains("SECRET"));
    }
}
