use std::future::Future;

use reqwest::{header, Client};
use tracing::debug;

use crate::{Config, Error, Result};

/// Where the driver gets raw pages from.
pub trait PageSource {
    /// HTML of listing page `page` (1-based).
    fn listing_page(&self, page: usize) -> impl Future<Output = Result<String>> + Send;
    /// JSON about document of community `name`, without the `r/` prefix.
    fn about(&self, name: &str) -> impl Future<Output = Result<String>> + Send;
}

/// HTTP side of a run. Owns its own client, built from [`Config`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    // Client uses Arc so we can clone cheaply
    client: Client,
    config: Config,
}

impl Fetcher {
    pub fn new(config: Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn get_text(&self, url: String) -> Result<String> {
        debug!(%url, "requesting");
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }
        let body = res.text().await?;
        Ok(body)
    }
}

impl PageSource for Fetcher {
    async fn listing_page(&self, page: usize) -> Result<String> {
        self.get_text(self.config.listing_url(page)).await
    }

    async fn about(&self, name: &str) -> Result<String> {
        self.get_text(self.config.about_url(name)).await
    }
}
