use std::time::Duration;

use reqwest::Client;
use tidings_core::error::AppError;

const USER_AGENT: &str = "Tidings/0.1 (news relay)";

/// HTTP fetcher shared by the source readers.
///
/// Downloads raw bodies with a fixed User-Agent and timeout, and maps
/// reqwest failures onto the [`AppError`] taxonomy.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(15))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// GET `url` and return the body bytes. Non-2xx statuses are errors.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
        Ok(body.to_vec())
    }

    /// GET `url` and return the body decoded as text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, AppError> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Map a reqwest error onto the error taxonomy. The URL is stripped since
/// some endpoints (the Bot API) embed credentials in the path.
pub(crate) fn classify(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {}", e.without_url()))
    } else {
        AppError::HttpError(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let body = fetcher
            .fetch_text(&format!("{}/rss", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<rss/>");
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher
            .fetch_bytes(&format!("{}/rss", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HttpError(ref m) if m.contains("HTTP 503")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::with_timeout(Duration::from_millis(200)).unwrap();
        let err = fetcher.fetch_bytes(&server.uri()).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }
}
