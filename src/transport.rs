use crate::config::TransportConfig;
use crate::{HarvestError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking request at a time; the pipeline never fans out.
pub trait Fetch {
    fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage>;

    /// Fetches and returns the body, treating any non-2xx status as a failure.
    fn fetch_html(&self, url: &Url, timeout: Duration) -> Result<String> {
        let page = self.fetch(url, timeout)?;
        if !page.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page.body)
    }
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage> {
        (**self).fetch(url, timeout)
    }
}

/// `reqwest` blocking client that always sends a browser-like header set.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let parsed = HeaderName::from_bytes(name.as_bytes())
                .ok()
                .zip(HeaderValue::from_str(value).ok());
            match parsed {
                Some((name, value)) => {
                    headers.insert(name, value);
                }
                None => warn!(header = %name, "skipping invalid header"),
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.page_timeout())
            .build()
            .map_err(|source| HarvestError::Transport {
                url: String::new(),
                source,
            })?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage> {
        debug!(%url, "GET");
        let transport_err = |source| HarvestError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .map_err(transport_err)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_err)?;
        Ok(FetchedPage { status, body })
    }
}
