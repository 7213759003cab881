//! reqwest-backed document fetcher.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{DocumentFetcher, UrlTemplate};
use crate::error::FetchError;

/// Default timeout for a complete document download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches documents over HTTP(S) from a URL built by a [`UrlTemplate`].
///
/// # Example
///
/// ```ignore
/// use manual_renderer::fetch::{DocumentFetcher, HttpDocumentFetcher, UrlTemplate};
///
/// let template = UrlTemplate::parse("https://ktane.timwi.de/PDF/{}.pdf")?;
/// let fetcher = HttpDocumentFetcher::new(template)?;
///
/// // GET https://ktane.timwi.de/PDF/The%20Button.pdf
/// let pdf = fetcher.fetch("The Button").await?;
/// ```
#[derive(Clone)]
pub struct HttpDocumentFetcher {
    client: Client,
    template: UrlTemplate,
}

impl HttpDocumentFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new(template: UrlTemplate) -> Result<Self, FetchError> {
        Self::with_timeout(template, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(template: UrlTemplate, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("manual-renderer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Request {
                url: template.to_string(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, template })
    }

    /// The template used to build fetch URLs.
    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, id: &str) -> Result<Bytes, FetchError> {
        let url = self.template.render(id);
        debug!(id = id, url = %url, "Fetching document");

        let request_error = |e: reqwest::Error| FetchError::Request {
            url: url.clone(),
            message: e.to_string(),
        };

        let response = self.client.get(&url).send().await.map_err(request_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { url: url.clone() });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        debug!(id = id, bytes = body.len(), "Fetched document");

        Ok(body)
    }
}
