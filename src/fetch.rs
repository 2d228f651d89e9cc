use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("dcr_builder/", env!("CARGO_PKG_VERSION"));

/// Anything that can turn a URL into page markup.
pub trait Fetch {
    fn get(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher. Only a 200 counts as success; no retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Client)?;
        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let http_err = |source| Error::Http {
            url: url.to_string(),
            source,
        };

        debug!("GET {}", url);
        let response = self.client.get(url).send().map_err(http_err)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(http_err)?;
        info!(
            "Fetched {} ({} bytes in {}ms)",
            url,
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }
}

/// Serves canned pages keyed by URL; any other URL is a 404.
#[cfg(test)]
#[derive(Default)]
pub struct StaticFetcher {
    pages: std::collections::HashMap<String, String>,
    hits: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.borrow().clone()
    }
}

#[cfg(test)]
impl Fetch for StaticFetcher {
    fn get(&self, url: &str) -> Result<String> {
        self.hits.borrow_mut().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| Error::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}
