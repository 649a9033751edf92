use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::debug;

use crate::config::ScrapeConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid request header {name}: {reason}")]
    Header { name: String, reason: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Opens one session per worker. A session is reused for every page of a chunk.
pub trait PageSource: Send + Sync + 'static {
    type Session: PageSession;

    fn open_session(&self) -> Result<Self::Session, FetchError>;
}

pub trait PageSession: Send + 'static {
    fn fetch(&mut self, page: u32) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Page 1 is the bare base URL, later pages live under `/page{N}`.
pub fn page_url(base_url: &str, page: u32) -> String {
    let base = base_url.trim_end_matches('/');
    if page <= 1 {
        base.to_string()
    } else {
        format!("{}/page{}", base, page)
    }
}

pub struct HttpSource {
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(config: &ScrapeConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::Header {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            let val = HeaderValue::from_str(value).map_err(|e| FetchError::Header {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            headers.insert(key, val);
        }
        Ok(Self {
            base_url: config.base_url.clone(),
            headers,
            timeout: config.timeout,
        })
    }
}

impl PageSource for HttpSource {
    type Session = HttpSession;

    fn open_session(&self) -> Result<HttpSession, FetchError> {
        let client = reqwest::Client::builder()
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(HttpSession {
            client,
            base_url: self.base_url.clone(),
        })
    }
}

/// Keep-alive connection pool shared by the pages of one chunk.
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
}

impl PageSession for HttpSession {
    async fn fetch(&mut self, page: u32) -> Result<Vec<u8>, FetchError> {
        let url = page_url(&self.base_url, page);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| transport_error(&url, e))?;
        Ok(body.to_vec())
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ScrapeConfig {
        ScrapeConfig {
            base_url: server.uri(),
            timeout: Duration::from_millis(500),
            headers: vec![("User-Agent".into(), "catalog-etl-test".into())],
            ..Default::default()
        }
    }

    #[test]
    fn first_page_is_bare_base_url() {
        assert_eq!(page_url("https://shop.test", 1), "https://shop.test");
        assert_eq!(page_url("https://shop.test/", 1), "https://shop.test");
    }

    #[test]
    fn later_pages_get_suffix() {
        assert_eq!(page_url("https://shop.test", 2), "https://shop.test/page2");
        assert_eq!(page_url("https://shop.test/", 50), "https://shop.test/page50");
    }

    #[test]
    fn rejects_bad_header_name() {
        let cfg = ScrapeConfig {
            headers: vec![("Bad Header".into(), "x".into())],
            ..Default::default()
        };
        assert!(matches!(HttpSource::new(&cfg), Err(FetchError::Header { .. })));
    }

    #[tokio::test]
    async fn fetches_pages_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "catalog-etl-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>one</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>two</html>"))
            .mount(&server)
            .await;

        let source = HttpSource::new(&config_for(&server)).unwrap();
        let mut session = source.open_session().unwrap();
        assert_eq!(session.fetch(1).await.unwrap(), b"<html>one</html>");
        assert_eq!(session.fetch(2).await.unwrap(), b"<html>two</html>");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page3"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpSource::new(&config_for(&server)).unwrap();
        let mut session = source.open_session().unwrap();
        let err = session.fetch(3).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }), "{}", err);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let source = HttpSource::new(&config_for(&server)).unwrap();
        let mut session = source.open_session().unwrap();
        let err = session.fetch(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "{}", err);
    }
}
