use reqwest::{Client, StatusCode, Url};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tracing::{debug, warn};

/// Composed in place of URL content when the fetch fails.
pub const FETCH_PLACEHOLDER: &str = "Error: Unable to fetch content from URL";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{url}' returned status {status}")]
    Status { url: String, status: StatusCode },
}

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<String, FetchError>> + 'a>>;

/// Plain GET of a page body.
pub trait PageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|err| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let parsed = parse_http_url(url)?;
            debug!(url = %parsed, "fetching url content");

            let response = self
                .client
                .get(parsed)
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                });
            }

            response.text().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })
        })
    }
}

/// Fetches `url`, substituting [`FETCH_PLACEHOLDER`] on any failure.
pub async fn content_or_placeholder(fetcher: &dyn PageFetcher, url: &str) -> String {
    match fetcher.fetch(url).await {
        Ok(body) => body,
        Err(err) => {
            warn!(url = %url, error = %err, "failed to fetch url content");
            FETCH_PLACEHOLDER.to_string()
        }
    }
}
