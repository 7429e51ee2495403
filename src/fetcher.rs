use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{redirect, Client, StatusCode};
use tracing::debug;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, FetchFailure};
use crate::utils::user_agents::random_user_agent;

/// Body of a successful (2xx) retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContent {
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

impl RawContent {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            body: body.into(),
        }
    }
}

/// One retrieval of one URL. Implementations never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawContent, FetchFailure>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }

    /// Browser-like headers with a freshly rotated User-Agent.
    fn request_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert("DNT", HeaderValue::from_static("1"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        headers
    }
}

/// Maps a non-success status to its failure class; `None` for 2xx.
pub fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    match status.as_u16() {
        200..=299 => None,
        403 | 503 => Some(FetchFailure::Blocked(status.as_u16())),
        404 => Some(FetchFailure::NotFound),
        code => Some(FetchFailure::ServerError(code)),
    }
}

fn classify_transport(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Transport(err.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawContent, FetchFailure> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .headers(Self::request_headers())
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if let Some(failure) = classify_status(status) {
            return Err(failure);
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(classify_transport)?;

        Ok(RawContent {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout_secs: u64) -> HttpFetcher {
        let config = ScraperConfig {
            request_timeout_secs: timeout_secs,
            ..ScraperConfig::default()
        };
        HttpFetcher::new(&config).unwrap()
    }

    #[rstest]
    #[case(200, None)]
    #[case(204, None)]
    #[case(403, Some(FetchFailure::Blocked(403)))]
    #[case(503, Some(FetchFailure::Blocked(503)))]
    #[case(404, Some(FetchFailure::NotFound))]
    #[case(500, Some(FetchFailure::ServerError(500)))]
    #[case(502, Some(FetchFailure::ServerError(502)))]
    #[case(429, Some(FetchFailure::ServerError(429)))]
    fn test_classify_status(#[case] code: u16, #[case] expected: Option<FetchFailure>) {
        assert_eq!(classify_status(StatusCode::from_u16(code).unwrap()), expected);
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<span>$19.99</span>"))
            .mount(&server)
            .await;

        let url = format!("{}/product", server.uri());
        let content = fetcher(5).fetch(&url).await.unwrap();
        assert_eq!(content.status, 200);
        assert_eq!(content.body, "<span>$19.99</span>");
        assert_eq!(content.url, url);
    }

    #[tokio::test]
    async fn test_fetch_blocked_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/blocked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = fetcher(5);
        let blocked = fetcher.fetch(&format!("{}/blocked", server.uri())).await;
        assert_eq!(blocked, Err(FetchFailure::Blocked(403)));

        let gone = fetcher.fetch(&format!("{}/gone", server.uri())).await;
        assert_eq!(gone, Err(FetchFailure::NotFound));

        let down = fetcher.fetch(&format!("{}/down", server.uri())).await;
        assert_eq!(down, Err(FetchFailure::Blocked(503)));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let result = fetcher(1).fetch(&format!("{}/slow", server.uri())).await;
        assert_eq!(result, Err(FetchFailure::Timeout));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport() {
        let result = fetcher(2).fetch("http://127.0.0.1:1/nothing").await;
        assert!(matches!(result, Err(FetchFailure::Transport(_))));
    }

    #[test]
    fn test_request_headers_rotate_user_agent() {
        let headers = HttpFetcher::request_headers();
        let ua = headers.get(USER_AGENT).unwrap().to_str().unwrap();
        assert!(crate::utils::user_agents::USER_AGENTS.contains(&ua));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }
}
