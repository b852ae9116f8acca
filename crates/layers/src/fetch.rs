//! HTTP boundary used for feature info requests and remote vector data.

use std::cell::RefCell;

use tracing::debug;

use crate::engine::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("no response for {0}")]
    Unavailable(String),
}

pub trait Fetcher {
    /// GETs `url` and returns the body as text.
    fn fetch_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, FetchError>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            debug!(url, "fetching");
            let http_err = |source| FetchError::Http {
                url: url.to_string(),
                source,
            };
            let resp = self.client.get(url).send().await.map_err(http_err)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            resp.text().await.map_err(http_err)
        })
    }
}

/// Serves canned bodies and records every requested URL. Used by tests and
/// by offline runs.
pub struct StaticFetcher {
    respond: Box<dyn Fn(&str) -> Option<String>>,
    requests: RefCell<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(respond: impl Fn(&str) -> Option<String> + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Answers every request with `body`.
    pub fn always(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(move |_| Some(body.clone()))
    }

    /// Fails every request.
    pub fn offline() -> Self {
        Self::new(|_| None)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl std::fmt::Debug for StaticFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticFetcher")
            .field("requests", &self.requests.borrow().len())
            .finish()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, FetchError>> {
        self.requests.borrow_mut().push(url.to_string());
        let res = (self.respond)(url).ok_or_else(|| FetchError::Unavailable(url.to_string()));
        Box::pin(std::future::ready(res))
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchError, Fetcher, StaticFetcher};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn static_fetcher_records_requests() {
        let fetcher = StaticFetcher::new(|url| url.ends_with(".json").then(|| "{}".to_string()));
        assert_eq!(fetcher.fetch_text("https://h.org/a.json").await.unwrap(), "{}");
        let err = fetcher.fetch_text("https://h.org/b").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(url) if url == "https://h.org/b"));
        assert_eq!(
            fetcher.requests(),
            vec!["https://h.org/a.json".to_string(), "https://h.org/b".to_string()]
        );
    }
}
